// ABOUTME: Delimiter-framed splitter for `#TYPE#PAYLOAD\r\n` text records

use bytes::Bytes;

use crate::frame::{FrameError, FrameSplitter, Scanned};

#[derive(Debug, Default)]
pub struct WialonIpsSplitter {
    bad_data: Option<Bytes>,
}

impl WialonIpsSplitter {
    pub fn new() -> Self {
        WialonIpsSplitter::default()
    }
}

impl FrameSplitter for WialonIpsSplitter {
    fn split(&mut self, buf: &[u8], at_eof: bool) -> Result<Scanned, FrameError> {
        if buf.is_empty() {
            return Ok(Scanned::need_more());
        }
        if buf[0] != b'#' {
            let bad = Bytes::copy_from_slice(buf);
            self.bad_data = Some(bad.clone());
            return Err(FrameError::BadData(bad));
        }
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let frame_len = pos + 2;
            let frame = Bytes::copy_from_slice(&buf[..frame_len]);
            return Ok(Scanned::frame(frame_len, frame));
        }
        if at_eof {
            let bad = Bytes::copy_from_slice(buf);
            self.bad_data = Some(bad.clone());
            return Err(FrameError::BadData(bad));
        }
        Ok(Scanned::need_more())
    }

    fn bad_data(&self) -> Option<&Bytes> {
        self.bad_data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_delimited_record() {
        let mut splitter = WialonIpsSplitter::new();
        let scanned = splitter.split(b"#L#123;secret\r\n", false).unwrap();
        assert_eq!(scanned.advance, 16);
        assert_eq!(scanned.frame, Some(Bytes::from_static(b"#L#123;secret\r\n")));
    }

    #[test]
    fn needs_more_without_terminator() {
        let mut splitter = WialonIpsSplitter::new();
        assert_eq!(splitter.split(b"#L#123", false).unwrap(), Scanned::need_more());
    }

    #[test]
    fn latches_bad_data_without_leading_hash() {
        let mut splitter = WialonIpsSplitter::new();
        let err = splitter.split(b"garbage\r\n", false).unwrap_err();
        assert!(matches!(err, FrameError::BadData(_)));
    }
}
