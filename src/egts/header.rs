// ABOUTME: The fixed 11-byte EGTS transport header: version/flags, frame-data length, packet id, packet type, HCS

use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use super::crc::crc8;

pub const HEADER_LEN: usize = 11;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header too short")]
    TooShort,
    #[error("unsupported header length {0}")]
    UnsupportedHeaderLength(u8),
    #[error("header checksum mismatch")]
    BadChecksum,
}

/// Wire values for `PT`, the packet-type byte of the EGTS header. Any byte
/// that doesn't name a known variant decodes as `AppData` — the original
/// protocol reserves other values for packet types this crate never needs
/// to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Response = 0,
    AppData = 1,
    Signed = 2,
}

impl PacketType {
    fn from_u8(v: u8) -> Self {
        PacketType::try_from(v).unwrap_or(PacketType::AppData)
    }

    fn as_u8(self) -> u8 {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub protocol_version: u8,
    pub security_key_id: u8,
    pub frame_data_len: u16,
    pub packet_id: u16,
    pub packet_type: PacketType,
}

impl Header {
    /// Parses the fixed 11-byte header prefix. Does not consume `buf`;
    /// callers that only need to know how much more data to wait for peek
    /// via `HEADER_LEN` before calling this.
    pub fn decode(buf: &[u8]) -> Result<Header, HeaderError> {
        if buf.len() < HEADER_LEN {
            return Err(HeaderError::TooShort);
        }
        let header_len = buf[3];
        if header_len as usize != HEADER_LEN {
            return Err(HeaderError::UnsupportedHeaderLength(header_len));
        }
        let hcs = buf[10];
        if crc8(&buf[0..10]) != hcs {
            return Err(HeaderError::BadChecksum);
        }
        // layout: [0]=PRV [1]=SKID [2]=flags [3]=HL [4]=HE [5..7]=FDL [7..9]=PID [9]=PT [10]=HCS
        let frame_data_len = u16::from_le_bytes([buf[5], buf[6]]);
        let packet_id = u16::from_le_bytes([buf[7], buf[8]]);
        let packet_type = PacketType::from_u8(buf[9]);
        Ok(Header {
            protocol_version: buf[0],
            security_key_id: buf[1],
            frame_data_len,
            packet_id,
            packet_type,
        })
    }

    pub fn encode(&self, out: &mut BytesMut) {
        let start = out.len();
        out.put_u8(self.protocol_version);
        out.put_u8(self.security_key_id);
        out.put_u8(0); // flags: no compression, no routing, PRF=0
        out.put_u8(HEADER_LEN as u8);
        out.put_u8(0); // header encoding
        out.put_u16_le(self.frame_data_len);
        out.put_u16_le(self.packet_id);
        out.put_u8(self.packet_type.as_u8());
        let hcs = crc8(&out[start..start + 10]);
        out.put_u8(hcs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let header =
            Header { protocol_version: 1, security_key_id: 0, frame_data_len: 42, packet_id: 7, packet_type: PacketType::AppData };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_flipped_checksum() {
        let header =
            Header { protocol_version: 1, security_key_id: 0, frame_data_len: 42, packet_id: 7, packet_type: PacketType::AppData };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert_eq!(Header::decode(&buf), Err(HeaderError::BadChecksum));
    }
}
