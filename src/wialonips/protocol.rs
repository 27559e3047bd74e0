// ABOUTME: WialonIPS Protocol: version-parameterized decode, login/session wiring, ack synthesis, adapter attachment

use bytes::Bytes;

use crate::frame::FrameSplitter;
use crate::protocol::{Protocol, ProtocolError, RespondResult};
use crate::session::{Session, Value};

use super::adapter::{WialonIpsAdapter, PROTO};
use super::packet::{Packet, PacketBody};
use super::splitter::WialonIpsSplitter;
use super::version::Version;

const SESSION_VERSION_KEY: &str = "version";

#[derive(Debug, Default)]
pub struct WialonIpsProtocol;

impl WialonIpsProtocol {
    pub fn new() -> Self {
        WialonIpsProtocol
    }

    fn type_tag(frame: &[u8]) -> String {
        let text = String::from_utf8_lossy(frame);
        let trimmed = text.trim_end_matches(['\r', '\n']);
        trimmed.splitn(3, '#').nth(1).unwrap_or("").to_owned()
    }
}

impl Protocol for WialonIpsProtocol {
    fn name(&self) -> &'static str {
        PROTO
    }

    fn new_frame_splitter(&self) -> Box<dyn FrameSplitter> {
        Box::new(WialonIpsSplitter::new())
    }

    fn respond(&self, session: &mut Session, frame: &[u8]) -> Result<RespondResult, ProtocolError> {
        match Packet::decode(frame) {
            Ok(packet) => match &packet.body {
                PacketBody::Login { imei, version, .. } => {
                    session.set_device(imei.clone());
                    let version_code: i64 = match version {
                        Version::V1 => 1,
                        Version::V2 => 2,
                        Version::Unknown => 0,
                    };
                    session.set(SESSION_VERSION_KEY, version_code);
                    Ok(RespondResult::with_response(Bytes::from(packet.response())))
                }
                PacketBody::Unknown => Ok(RespondResult::close()),
                PacketBody::Position(_) | PacketBody::Batch(_) => {
                    let device_id = session.device().unwrap_or("").to_owned();
                    let response = Bytes::from(packet.response());
                    let adapter = WialonIpsAdapter::new(device_id, packet);
                    Ok(RespondResult::with_response(response).with_adapter(Box::new(adapter)))
                }
            },
            Err(err) => {
                if Self::type_tag(frame) == "L" {
                    Ok(RespondResult::close())
                } else {
                    Err(ProtocolError::Decode(err.to_string()))
                }
            }
        }
    }
}

#[allow(dead_code)]
fn session_version(session: &Session) -> Version {
    match session.get(SESSION_VERSION_KEY).and_then(Value::as_int) {
        Some(1) => Version::V1,
        Some(2) => Version::V2,
        _ => Version::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_sets_device_and_version() {
        let protocol = WialonIpsProtocol::new();
        let mut session = Session::new();
        let result = protocol.respond(&mut session, b"#L#123456789012345;secret\r\n").unwrap();
        assert_eq!(session.device(), Some("123456789012345"));
        assert!(!result.close_session);
        assert_eq!(session_version(&session), Version::V1);
    }

    #[test]
    fn malformed_login_closes_session() {
        let protocol = WialonIpsProtocol::new();
        let mut session = Session::new();
        let result = protocol.respond(&mut session, b"#L#\r\n").unwrap();
        assert!(result.close_session);
    }

    #[test]
    fn unknown_type_closes_session_without_event() {
        let protocol = WialonIpsProtocol::new();
        let mut session = Session::new();
        let result = protocol.respond(&mut session, b"#XX#garbage\r\n").unwrap();
        assert!(result.close_session);
        assert!(result.adapter.is_none());
    }

    #[test]
    fn data_after_login_produces_position() {
        let protocol = WialonIpsProtocol::new();
        let mut session = Session::new();
        protocol.respond(&mut session, b"#L#123456789012345;secret\r\n").unwrap();
        let result = protocol.respond(&mut session, b"#SD#010124;120000;55.7;N;37.6;E;60;90;100;8\r\n").unwrap();
        let positions = result.adapter.unwrap().generic_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].device_id, "123456789012345");
    }
}
