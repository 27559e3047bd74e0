// ABOUTME: WialonIPS protocol implementation: line-oriented text, `#TYPE#PAYLOAD\r\n` framing
// ABOUTME: Grounded on the original project's internal/protocol/wialonips package

mod adapter;
mod packet;
mod protocol;
mod splitter;
mod version;

pub use adapter::WialonIpsAdapter;
pub use packet::{Packet, PacketBody, PositionRecord, WialonError};
pub use protocol::WialonIpsProtocol;
pub use splitter::WialonIpsSplitter;
pub use version::Version;
