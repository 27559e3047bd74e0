// ABOUTME: Peeks the stream to classify its protocol, then delegates splitting to that protocol's own splitter
// ABOUTME: Once a concrete protocol is identified the delegation is permanent for the life of the connection

use bytes::Bytes;

use crate::egts::EgtsSplitter;
use crate::frame::{FrameError, FrameSplitter, Scanned};
use crate::wialonips::WialonIpsSplitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    Egts,
    WialonIps,
    Bce,
    Unknown,
}

/// Mirrors the detector's peek heuristic: first byte `0x01` means EGTS; the
/// literal prefix `#BCE#\r\n` is a reserved stub marker; a `#`-delimited
/// triple (exactly three segments) means WialonIPS; anything else is
/// unclassified.
pub fn classify(data: &[u8]) -> Classified {
    if data.is_empty() {
        return Classified::Unknown;
    }
    if data[0] == 0x01 {
        return Classified::Egts;
    }
    if data.len() > 7 && &data[..7] == b"#BCE#\r\n" {
        return Classified::Bce;
    }
    if data.len() > 7 {
        let parts: Vec<&[u8]> = data.split(|&b| b == b'#').collect();
        if parts.len() == 3 {
            return Classified::WialonIps;
        }
    }
    Classified::Unknown
}

enum State {
    Undetected,
    Egts(EgtsSplitter),
    WialonIps(WialonIpsSplitter),
}

pub struct DetectorSplitter {
    state: State,
}

impl DetectorSplitter {
    pub fn new() -> Self {
        DetectorSplitter { state: State::Undetected }
    }
}

impl Default for DetectorSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSplitter for DetectorSplitter {
    fn split(&mut self, buf: &[u8], at_eof: bool) -> Result<Scanned, FrameError> {
        match &mut self.state {
            State::Egts(splitter) => return splitter.split(buf, at_eof),
            State::WialonIps(splitter) => return splitter.split(buf, at_eof),
            State::Undetected => {}
        }

        if at_eof && buf.is_empty() {
            return Ok(Scanned::need_more());
        }

        match classify(buf) {
            Classified::Egts => {
                let mut splitter = EgtsSplitter::new();
                let scanned = splitter.split(buf, at_eof)?;
                self.state = State::Egts(splitter);
                Ok(scanned)
            }
            Classified::WialonIps => {
                let mut splitter = WialonIpsSplitter::new();
                let scanned = splitter.split(buf, at_eof)?;
                self.state = State::WialonIps(splitter);
                Ok(scanned)
            }
            Classified::Bce => {
                if buf.len() >= 7 {
                    Ok(Scanned::skip(7))
                } else {
                    Ok(Scanned::need_more())
                }
            }
            Classified::Unknown => {
                if at_eof {
                    return Ok(Scanned::frame(buf.len(), Bytes::copy_from_slice(buf)));
                }
                if buf.len() < 16 {
                    return Ok(Scanned::need_more());
                }
                Ok(Scanned::frame(16, Bytes::copy_from_slice(&buf[..16])))
            }
        }
    }

    fn bad_data(&self) -> Option<&Bytes> {
        match &self.state {
            State::Egts(splitter) => splitter.bad_data(),
            State::WialonIps(splitter) => splitter.bad_data(),
            State::Undetected => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_egts_by_leading_byte() {
        assert_eq!(classify(&[0x01, 0x00, 0x00]), Classified::Egts);
    }

    #[test]
    fn classifies_bce_marker() {
        assert_eq!(classify(b"#BCE#\r\nrest"), Classified::Bce);
    }

    #[test]
    fn classifies_wialonips_triple() {
        assert_eq!(classify(b"#L#imei;pass\r\n"), Classified::WialonIps);
    }

    #[test]
    fn unknown_short_input() {
        assert_eq!(classify(b"xx"), Classified::Unknown);
    }

    #[test]
    fn delegates_to_egts_once_detected() {
        let frame = crate::egts::Packet::encode_appdata(1, &[]);
        let mut splitter = DetectorSplitter::new();
        let scanned = splitter.split(&frame, false).unwrap();
        assert_eq!(scanned.frame, Some(frame));
    }
}
