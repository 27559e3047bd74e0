// ABOUTME: A whole EGTS frame: header plus services-frame-data, and the acknowledgement response it implies
// ABOUTME: Decode tolerates a malformed services-frame-data body -- the splitter has already verified both checksums

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::crc::crc16;
use super::header::{Header, HeaderError, PacketType, HEADER_LEN};
use super::records::ServiceDataRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("frame shorter than declared frame data length")]
    Truncated,
    #[error("body checksum mismatch")]
    BadBodyChecksum,
}

/// Result code carried in a response packet's body, per the standard's
/// `EGTS_PC_*` family. Only the values this crate produces/expects are
/// named; an unrecognized code on input is preserved numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Other(u8),
}

impl ResultCode {
    fn as_u8(self) -> u8 {
        match self {
            ResultCode::Ok => 0,
            ResultCode::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub records: Vec<ServiceDataRecord>,
}

impl Packet {
    /// Decodes a whole frame (header + frame data + CRC16) as already
    /// delimited by [`super::splitter::EgtsSplitter`]. The splitter has
    /// already validated both checksums, so a checksum mismatch here would
    /// indicate an internal inconsistency rather than a wire error.
    pub fn decode(frame: &[u8]) -> Result<Packet, PacketError> {
        let header = Header::decode(frame)?;
        let fdl = header.frame_data_len as usize;
        let body_start = HEADER_LEN;
        let body_end = body_start + fdl;
        if frame.len() < body_end + 2 {
            return Err(PacketError::Truncated);
        }
        let body = &frame[body_start..body_end];
        let expected_crc = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
        if crc16(body) != expected_crc {
            return Err(PacketError::BadBodyChecksum);
        }

        let records = match header.packet_type {
            PacketType::AppData => ServiceDataRecord::decode_all(body),
            _ => Vec::new(),
        };
        Ok(Packet { header, records })
    }

    pub fn encode(&self, body: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER_LEN + body.len() + 2);
        let header = Header { frame_data_len: body.len() as u16, ..self.header };
        header.encode(&mut out);
        out.extend_from_slice(body);
        out.put_u16_le(crc16(body));
        out.freeze()
    }

    /// Builds the protocol-defined acknowledgement: a `PT_RESPONSE` packet
    /// whose body names the packet id being acknowledged and a result code.
    /// `PT_RESPONSE` packets themselves are never acknowledged.
    pub fn response(&self) -> Bytes {
        if self.header.packet_type == PacketType::Response {
            return Bytes::new();
        }
        let mut body = BytesMut::new();
        body.put_u16_le(self.header.packet_id);
        body.put_u8(ResultCode::Ok.as_u8());

        let ack_header = Header {
            protocol_version: self.header.protocol_version,
            security_key_id: self.header.security_key_id,
            frame_data_len: body.len() as u16,
            packet_id: self.header.packet_id.wrapping_add(1),
            packet_type: PacketType::Response,
        };
        let mut out = BytesMut::with_capacity(HEADER_LEN + body.len() + 2);
        ack_header.encode(&mut out);
        out.extend_from_slice(&body);
        out.put_u16_le(crc16(&body));
        out.freeze()
    }

    /// Encodes a complete appdata packet carrying `records`, for use by
    /// tests and the replay fixture generator.
    pub fn encode_appdata(packet_id: u16, records: &[Bytes]) -> Bytes {
        let mut body = BytesMut::new();
        for record in records {
            body.extend_from_slice(record);
        }
        let header = Header {
            protocol_version: 1,
            security_key_id: 0,
            frame_data_len: body.len() as u16,
            packet_id,
            packet_type: PacketType::AppData,
        };
        let mut out = BytesMut::with_capacity(HEADER_LEN + body.len() + 2);
        header.encode(&mut out);
        out.extend_from_slice(&body);
        out.put_u16_le(crc16(&body));
        out.freeze()
    }
}
