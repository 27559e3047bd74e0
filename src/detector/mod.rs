// ABOUTME: Auto-detecting Protocol that peeks the stream and delegates to the matching concrete protocol's splitter
// ABOUTME: Grounded on the original project's internal/protocol/detector package

mod protocol;
mod splitter;

pub use protocol::DetectorProtocol;
pub use splitter::{classify, Classified, DetectorSplitter};
