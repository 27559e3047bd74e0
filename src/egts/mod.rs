// ABOUTME: EGTS protocol implementation: binary, length-prefixed, CRC8 header / CRC16 body
// ABOUTME: Grounded on the original project's internal/protocol/egts package, with its upstream codec reimplemented here

mod adapter;
mod crc;
mod header;
mod packet;
mod protocol;
mod records;
mod splitter;

pub use adapter::EgtsAdapter;
pub use packet::{Packet, PacketError};
pub use protocol::EgtsProtocol;
pub use records::{AltitudeSign, Hemisphere, ServiceDataRecord, SrPosData, Subrecord};
pub use splitter::EgtsSplitter;
