// ABOUTME: Stateful EGTS frame splitter: header -> HCS check -> frame data -> SFRCS check, latching BadData on mismatch
// ABOUTME: Generalizes the teacher crate's length-prefixed PDU scanning to EGTS's two-checksum framing

use bytes::Bytes;

use crate::frame::{FrameError, FrameSplitter, Scanned};

use super::crc::crc16;
use super::header::{Header, HEADER_LEN};

#[derive(Debug, Default)]
pub struct EgtsSplitter {
    bad_data: Option<Bytes>,
}

impl EgtsSplitter {
    pub fn new() -> Self {
        EgtsSplitter::default()
    }
}

impl FrameSplitter for EgtsSplitter {
    fn split(&mut self, buf: &[u8], _at_eof: bool) -> Result<Scanned, FrameError> {
        if buf.len() < HEADER_LEN {
            return Ok(Scanned::need_more());
        }

        let header = match Header::decode(buf) {
            Ok(header) => header,
            Err(_) => {
                let bad = Bytes::copy_from_slice(buf);
                self.bad_data = Some(bad.clone());
                return Err(FrameError::BadData(bad));
            }
        };

        let frame_len = HEADER_LEN + header.frame_data_len as usize + 2;
        if buf.len() < frame_len {
            return Ok(Scanned::need_more());
        }

        let body = &buf[HEADER_LEN..HEADER_LEN + header.frame_data_len as usize];
        let crc_offset = HEADER_LEN + header.frame_data_len as usize;
        let expected_crc = u16::from_le_bytes([buf[crc_offset], buf[crc_offset + 1]]);
        if crc16(body) != expected_crc {
            let bad = Bytes::copy_from_slice(&buf[..frame_len]);
            self.bad_data = Some(bad.clone());
            return Err(FrameError::BadData(bad));
        }

        let frame = Bytes::copy_from_slice(&buf[..frame_len]);
        Ok(Scanned::frame(frame_len, frame))
    }

    fn bad_data(&self) -> Option<&Bytes> {
        self.bad_data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::packet::Packet;
    use super::*;

    #[test]
    fn needs_more_on_partial_header() {
        let mut splitter = EgtsSplitter::new();
        assert_eq!(splitter.split(&[1, 2, 3], false).unwrap(), Scanned::need_more());
    }

    #[test]
    fn yields_whole_frame_once_buffered() {
        let frame = Packet::encode_appdata(1, &[]);
        let mut splitter = EgtsSplitter::new();
        let scanned = splitter.split(&frame, false).unwrap();
        assert_eq!(scanned.advance, frame.len());
        assert_eq!(scanned.frame, Some(frame));
    }

    #[test]
    fn latches_bad_data_on_body_checksum_mismatch() {
        let mut frame = Packet::encode_appdata(1, &[]).to_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let mut splitter = EgtsSplitter::new();
        let err = splitter.split(&frame, false).unwrap_err();
        assert!(matches!(err, FrameError::BadData(_)));
        assert!(splitter.bad_data().is_some());
    }
}
