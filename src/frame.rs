// ABOUTME: Stateful incremental tokenizer contract turning a byte stream into whole protocol frames
// ABOUTME: Generalizes the teacher crate's check-then-parse connection loop into a reusable trait

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Progress reported by one call to [`FrameSplitter::split`].
///
/// `advance` bytes should be discarded from the caller's buffer regardless
/// of whether a frame was produced — a splitter may need to skip bytes (for
/// example a stray delimiter) without yielding anything. `frame` is `None`
/// when more bytes are needed before a whole frame is available; a splitter
/// must never report `frame: Some(Bytes::new())` — an empty frame is never
/// valid progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
    pub advance: usize,
    pub frame: Option<Bytes>,
}

impl Scanned {
    pub fn need_more() -> Self {
        Scanned { advance: 0, frame: None }
    }

    pub fn frame(advance: usize, frame: Bytes) -> Self {
        Scanned { advance, frame: Some(frame) }
    }

    pub fn skip(advance: usize) -> Self {
        Scanned { advance, frame: None }
    }
}

/// Error latched by a splitter when it determines the stream cannot be
/// resynchronized to a valid frame boundary without operator intervention.
/// Reaching this state is terminal for the splitter instance: the connection
/// handler closes the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad data: {0:x?}")]
    BadData(Bytes),
}

/// Incremental tokenizer over a byte stream. One instance is created per
/// connection (or per direction, for the replayer's read-one-response path)
/// and owns all scratch state needed to resume splitting after a partial
/// read.
///
/// `split` is called with the current unread prefix of the stream and a flag
/// indicating whether this is the final fill (end of stream / end of file).
/// Returning `Scanned { advance: 0, frame: None }` requests more bytes.
/// Returning `Err` latches a terminal bad-data state; `bad_data()` then
/// exposes the offending bytes for logging.
pub trait FrameSplitter: Send {
    fn split(&mut self, buf: &[u8], at_eof: bool) -> Result<Scanned, FrameError>;

    /// The bytes that failed to parse, once the splitter has latched
    /// `FrameError::BadData`. `None` before that point.
    fn bad_data(&self) -> Option<&Bytes> {
        None
    }
}

/// Error surfaced from [`FramedReader::read_frame`]: either an I/O failure
/// on the underlying reader, or a latched bad-data condition from the
/// splitter (terminal — the caller should close the connection/file).
#[derive(Debug, Error)]
pub enum ReadFrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("bad data: {0:x?}")]
    BadData(Bytes),
}

/// Buffers bytes read from an `AsyncRead` and repeatedly hands them to a
/// `FrameSplitter`, yielding whole frames one at a time. This generalizes
/// the teacher crate's `Connection::read_frame`/`parse_frame` pair (which
/// was hard-wired to one PDU format) to any protocol's splitter.
pub struct FramedReader {
    buffer: BytesMut,
    splitter: Box<dyn FrameSplitter>,
}

impl FramedReader {
    pub fn new(splitter: Box<dyn FrameSplitter>) -> Self {
        FramedReader { buffer: BytesMut::with_capacity(4 * 1024), splitter }
    }

    pub fn splitter(&self) -> &dyn FrameSplitter {
        self.splitter.as_ref()
    }

    /// Reads the next whole frame, fetching more bytes from `reader` as
    /// needed. Returns `Ok(None)` on a clean EOF (no partial frame left
    /// buffered).
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Option<Bytes>, ReadFrameError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(frame) = self.try_parse(false)? {
                return Ok(Some(frame));
            }
            let n = reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if let Some(frame) = self.try_parse(true)? {
                    return Ok(Some(frame));
                }
                return Ok(None);
            }
        }
    }

    /// Drains as many whole frames as the currently-buffered bytes allow,
    /// skipping any empty frame the splitter reports (a splitter should
    /// never produce one, but the handler tolerates it per spec rather than
    /// asserting).
    fn try_parse(&mut self, at_eof: bool) -> Result<Option<Bytes>, ReadFrameError> {
        loop {
            if self.buffer.is_empty() && !at_eof {
                return Ok(None);
            }
            let scanned = match self.splitter.split(&self.buffer, at_eof) {
                Ok(scanned) => scanned,
                Err(FrameError::BadData(bytes)) => return Err(ReadFrameError::BadData(bytes)),
            };
            if scanned.advance == 0 && scanned.frame.is_none() {
                return Ok(None);
            }
            if scanned.advance > 0 {
                self.buffer.advance(scanned.advance);
            }
            match scanned.frame {
                Some(frame) if !frame.is_empty() => return Ok(Some(frame)),
                Some(_) => continue,
                None => continue,
            }
        }
    }
}
