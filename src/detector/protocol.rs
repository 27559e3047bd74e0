// ABOUTME: Classification-only Protocol: records which concrete protocol was detected into Session.device, no Adapter

use bytes::Bytes;

use crate::frame::FrameSplitter;
use crate::protocol::{Protocol, ProtocolError, RespondResult};
use crate::session::Session;

use super::splitter::{classify, Classified, DetectorSplitter};

pub const PROTO: &str = "detector";

pub struct DetectorProtocol {
    dummy_response: Bytes,
}

impl DetectorProtocol {
    pub fn new(dummy_response: Vec<u8>) -> Self {
        DetectorProtocol { dummy_response: Bytes::from(dummy_response) }
    }
}

fn label(classified: Classified) -> &'static str {
    match classified {
        Classified::Egts => "egts",
        Classified::WialonIps => "wialonips",
        Classified::Bce => "bce",
        Classified::Unknown => "unknown",
    }
}

impl Protocol for DetectorProtocol {
    fn name(&self) -> &'static str {
        PROTO
    }

    fn new_frame_splitter(&self) -> Box<dyn FrameSplitter> {
        Box::new(DetectorSplitter::new())
    }

    fn respond(&self, session: &mut Session, frame: &[u8]) -> Result<RespondResult, ProtocolError> {
        session.set_device(label(classify(frame)));
        Ok(RespondResult::with_response(self.dummy_response.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_egts_classification_into_session() {
        let protocol = DetectorProtocol::new(Vec::new());
        let mut session = Session::new();
        let frame = crate::egts::Packet::encode_appdata(1, &[]);
        let result = protocol.respond(&mut session, &frame).unwrap();
        assert_eq!(session.device(), Some("egts"));
        assert!(!result.close_session);
        assert!(result.adapter.is_none());
    }
}
