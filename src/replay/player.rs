// ABOUTME: Replays one captured file against a live server: dial, frame-by-frame write/read, inter-frame delay
// ABOUTME: Per-file I/O errors are logged and abandon only that file, mirroring the original replayer's return-nil policy

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::frame::{FramedReader, ReadFrameError};
use crate::protocol::Protocol;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("dial timed out")]
    DialTimeout,
    #[error("write timed out")]
    WriteTimeout,
    #[error("read timed out")]
    ReadTimeout,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("splitter latched bad data")]
    BadData,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub address: String,
    pub dial_timeout: Duration,
    pub network_timeout: Duration,
    pub packet_delay: Duration,
}

pub struct Replayer {
    config: ReplayConfig,
    protocol: Arc<dyn Protocol>,
}

impl Replayer {
    pub fn new(config: ReplayConfig, protocol: Arc<dyn Protocol>) -> Self {
        Replayer { config, protocol }
    }

    /// Replays one file. Errors never propagate past this call: a failure
    /// abandons the file and is logged, so one bad file never aborts a
    /// batch.
    pub async fn play(&self, path: &Path) {
        info!(file = %path.display(), "replaying");
        if let Err(err) = self.play_inner(path).await {
            warn!(file = %path.display(), %err, "replay failed, abandoning file");
        }
    }

    async fn play_inner(&self, path: &Path) -> Result<(), ReplayError> {
        let mut file = File::open(path).await?;

        let stream = timeout(self.config.dial_timeout, TcpStream::connect(&self.config.address))
            .await
            .map_err(|_| ReplayError::DialTimeout)??;
        let (mut read_half, mut write_half) = stream.into_split();

        let mut file_reader = FramedReader::new(self.protocol.new_frame_splitter());
        let mut rng = rand::thread_rng();

        loop {
            let frame = match file_reader.read_frame(&mut file).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(ReadFrameError::BadData(_)) => return Err(ReplayError::BadData),
                Err(ReadFrameError::Io(err)) => return Err(ReplayError::Io(err)),
            };

            debug!(file = %path.display(), bytes = frame.len(), "sending");
            timeout(self.config.network_timeout, write_half.write_all(&frame)).await.map_err(|_| ReplayError::WriteTimeout)??;

            let mut response_reader = FramedReader::new(self.protocol.new_frame_splitter());
            let response = timeout(self.config.network_timeout, response_reader.read_frame(&mut read_half))
                .await
                .map_err(|_| ReplayError::ReadTimeout)?;
            match response {
                Ok(Some(bytes)) => debug!(file = %path.display(), bytes = bytes.len(), "got reply"),
                Ok(None) => warn!(file = %path.display(), "connection closed before response"),
                Err(ReadFrameError::BadData(_)) => return Err(ReplayError::BadData),
                Err(ReadFrameError::Io(err)) => return Err(ReplayError::Io(err)),
            }

            let delay_ms = self.config.packet_delay.as_millis().max(1) as u64;
            let sleep_for = rng.gen_range(0..delay_ms);
            tokio::time::sleep(Duration::from_millis(sleep_for)).await;
        }

        Ok(())
    }
}
