// ABOUTME: Abstract capability a connection handler drives: framing, response synthesis, adapter extraction
// ABOUTME: A sum type over EGTS/WialonIPS/Detector would also work; a trait keeps each implementation in its own module

use bytes::Bytes;
use thiserror::Error;

use crate::frame::FrameSplitter;
use crate::position::Adapter;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Decode(String),
    #[error("unsupported packet type: {0}")]
    Unsupported(String),
}

/// The outcome of handing one frame to [`Protocol::respond`].
///
/// `close_session` is the sole authority on whether the connection handler
/// tears down the session; a decode error on its own never implies closure.
pub struct RespondResult {
    pub close_session: bool,
    pub response: Bytes,
    pub adapter: Option<Box<dyn Adapter>>,
}

impl RespondResult {
    pub fn empty() -> Self {
        RespondResult { close_session: false, response: Bytes::new(), adapter: None }
    }

    pub fn close() -> Self {
        RespondResult { close_session: true, response: Bytes::new(), adapter: None }
    }

    pub fn with_response(response: Bytes) -> Self {
        RespondResult { close_session: false, response, adapter: None }
    }

    pub fn with_adapter(mut self, adapter: Box<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }
}

/// Protocol capability: owns framing, one-frame response synthesis, and
/// extraction of normalized positions (via the `Adapter` it attaches to its
/// `RespondResult`).
pub trait Protocol: Send + Sync {
    /// Stable tag, also used as the `protocol` field on `Position`.
    fn name(&self) -> &'static str;

    /// A fresh splitter instance; one per connection.
    fn new_frame_splitter(&self) -> Box<dyn FrameSplitter>;

    /// Decode the frame, mutate `session` for login/identity frames, and
    /// produce the response bytes (possibly empty) plus an optional adapter.
    fn respond(&self, session: &mut Session, frame: &[u8]) -> Result<RespondResult, ProtocolError>;
}
