// ABOUTME: Drives one TCP connection: splitter -> Protocol.respond -> write -> fan-out, with idle-deadline management
// ABOUTME: Generalizes the teacher crate's per-connection task model to an arbitrary pluggable Protocol

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::bus::{Event, EventBus};
use crate::frame::{FramedReader, ReadFrameError};
use crate::protocol::Protocol;
use crate::session::Session;

/// Per-connection handler. One instance (and one `tokio::task`) per accepted
/// socket; a `Handler` is never shared across connections — only the
/// `Protocol` and `EventBus` it was built with are.
pub struct ConnectionHandler {
    protocol: Arc<dyn Protocol>,
    bus: Arc<EventBus>,
    idle_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(protocol: Arc<dyn Protocol>, bus: Arc<EventBus>, idle_timeout: Duration) -> Self {
        ConnectionHandler { protocol, bus, idle_timeout }
    }

    /// Runs the read/respond/publish loop over `stream` until the peer
    /// closes cleanly, the splitter latches bad data, a write fails, or the
    /// protocol signals `close_session`. Never panics out — every error path
    /// is logged and the function returns.
    pub async fn handle<S>(&self, stream: S, remote: String)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let session_id = nanoid::nanoid!(8);
        let span = tracing::info_span!("session", id = %session_id, remote = %remote, proto = self.protocol.name());
        let _enter = span.enter();
        debug!("session opened");

        let opened = std::time::Instant::now();
        self.run(stream).await;
        debug!(elapsed = ?opened.elapsed(), "session closed");
    }

    async fn run<S>(&self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new();
        let mut reader = FramedReader::new(self.protocol.new_frame_splitter());

        loop {
            let frame = match timeout(self.idle_timeout, reader.read_frame(&mut stream)).await {
                Ok(Ok(Some(frame))) => frame,
                Ok(Ok(None)) => {
                    debug!("peer closed connection");
                    return;
                }
                Ok(Err(ReadFrameError::BadData(bytes))) => {
                    error!(bytes = %hex_encode(&bytes), "bad data, closing session");
                    return;
                }
                Ok(Err(ReadFrameError::Io(err))) => {
                    error!(%err, "read error");
                    return;
                }
                Err(_) => {
                    debug!("idle timeout elapsed");
                    return;
                }
            };

            debug!(dir = "in", bytes = %hex_encode(&frame), "frame");

            let result = match self.protocol.respond(&mut session, &frame) {
                Ok(result) => result,
                Err(err) => {
                    warn!(%err, "protocol decode warning");
                    continue;
                }
            };

            debug!(dir = "out", device = session.device().unwrap_or(""), bytes = %hex_encode(&result.response), "frame");

            if !result.response.is_empty() {
                if let Err(err) = stream.write_all(&result.response).await {
                    error!(%err, "write error");
                    return;
                }
                if let Err(err) = stream.flush().await {
                    error!(%err, "flush error");
                    return;
                }
            }

            if result.close_session {
                return;
            }

            if let Some(adapter) = result.adapter {
                for mut position in adapter.generic_positions() {
                    position.server_time = Some(chrono::Utc::now());
                    self.bus.publish(Event::position(position), self.idle_timeout);
                }
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
