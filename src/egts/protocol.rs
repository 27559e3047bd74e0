// ABOUTME: EGTS Protocol implementation: decode, device-identity extraction, ack synthesis, adapter attachment

use bytes::Bytes;

use crate::frame::FrameSplitter;
use crate::protocol::{Protocol, ProtocolError, RespondResult};
use crate::session::Session;

use super::adapter::{EgtsAdapter, PROTO};
use super::packet::{Packet, PacketError};
use super::records::Subrecord;
use super::splitter::EgtsSplitter;

#[derive(Debug, Default)]
pub struct EgtsProtocol;

impl EgtsProtocol {
    pub fn new() -> Self {
        EgtsProtocol
    }

    fn device_identity(packet: &Packet) -> Option<String> {
        for record in &packet.records {
            if let Some(object_id) = record.object_identifier {
                return Some(object_id.to_string());
            }
            for subrecord in &record.subrecords {
                if let Subrecord::TermIdentity(term) = subrecord {
                    return Some(term.terminal_identifier.to_string());
                }
            }
        }
        None
    }
}

impl Protocol for EgtsProtocol {
    fn name(&self) -> &'static str {
        PROTO
    }

    fn new_frame_splitter(&self) -> Box<dyn FrameSplitter> {
        Box::new(EgtsSplitter::new())
    }

    fn respond(&self, session: &mut Session, frame: &[u8]) -> Result<RespondResult, ProtocolError> {
        let packet = Packet::decode(frame).map_err(|err: PacketError| ProtocolError::Decode(err.to_string()))?;

        if let Some(device) = Self::device_identity(&packet) {
            session.set_device(device);
        }

        let response = packet.response();
        let valid = true;
        let result = RespondResult::with_response(response).with_adapter(Box::new(EgtsAdapter::new(packet, valid)));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egts::header::{Header, PacketType};
    use crate::egts::records::{AltitudeSign, Hemisphere, ServiceDataRecord, SrPosData};

    #[test]
    fn respond_sets_device_and_returns_ack() {
        let pos = SrPosData {
            navigation_time: 0,
            latitude: 0.0,
            lahs: Hemisphere::North,
            longitude: 0.0,
            lohs: Hemisphere::East,
            valid: true,
            altitude: None,
            altitude_sign: AltitudeSign::AboveSea,
            speed: 0.0,
            direction: 0,
            odometer: 0,
            digital_inputs: 0,
            source: 0,
            movement: false,
        };
        let record = ServiceDataRecord::encode_position(1, 42, &pos);
        let frame = Packet::encode_appdata(7, &[record]);

        let protocol = EgtsProtocol::new();
        let mut session = Session::new();
        let result = protocol.respond(&mut session, &frame).unwrap();

        assert_eq!(session.device(), Some("42"));
        assert!(!result.response.is_empty());
        assert!(!result.close_session);
        let positions = result.adapter.unwrap().generic_positions();
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn response_is_a_no_op_packet_for_response_type_input() {
        let header = Header { protocol_version: 1, security_key_id: 0, frame_data_len: 0, packet_id: 1, packet_type: PacketType::Response };
        let packet = Packet { header, records: Vec::new() };
        assert_eq!(packet.response(), Bytes::new());
    }
}
