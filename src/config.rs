// ABOUTME: Layered configuration: built-in defaults, optional TOML file, then environment overrides
// ABOUTME: Recognized keys mirror the original project's Viper-backed cfg/config.go exactly

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::detector::DetectorProtocol;
use crate::egts::EgtsProtocol;
use crate::logging::LogLevel;
use crate::protocol::Protocol;
use crate::wialonips::WialonIpsProtocol;

const ENV_PREFIX: &str = "FLEETLINK_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("unknown protocol {0:?}, expected one of egts, wialonips, detector")]
    UnknownProtocol(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub address: String,
    pub proto: String,
    pub timeouts: u64,
    #[serde(rename = "socket-reuse-port")]
    pub socket_reuse_port: bool,
    #[serde(rename = "socket-fast-open")]
    pub socket_fast_open: bool,
    #[serde(rename = "socket-defer-accept")]
    pub socket_defer_accept: bool,
    pub loops: usize,
    #[serde(rename = "workerpool-shards")]
    pub workerpool_shards: usize,
    #[serde(rename = "allow-thread-locking")]
    pub allow_thread_locking: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            address: ":5001".to_owned(),
            proto: "egts".to_owned(),
            timeouts: 600,
            socket_reuse_port: true,
            socket_fast_open: false,
            socket_defer_accept: false,
            loops: 1,
            workerpool_shards: 256,
            allow_thread_locking: false,
        }
    }
}

impl TcpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.address)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts)
    }

    pub fn protocol(&self) -> Result<Arc<dyn Protocol>, ConfigError> {
        protocol_by_name(&self.proto)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub address: String,
    pub proto: String,
    #[serde(rename = "in")]
    pub in_path: String,
    pub mask: String,
    pub nums: usize,
    pub delay: u64,
    pub timeouts: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            address: "127.0.0.1:5001".to_owned(),
            proto: "egts".to_owned(),
            in_path: "./in".to_owned(),
            mask: "*".to_owned(),
            nums: 200,
            delay: 100,
            timeouts: 10,
        }
    }
}

impl PlayerConfig {
    pub fn protocol(&self) -> Result<Arc<dyn Protocol>, ConfigError> {
        protocol_by_name(&self.proto)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts)
    }

    pub fn packet_delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConsumersConfig {
    #[serde(rename = "sample-db")]
    pub sample_db: Option<SampleDbConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleDbConfig {
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub console: bool,
    #[serde(rename = "no-block")]
    pub no_block: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: LogLevel::default(), console: true, no_block: false }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tcp: TcpConfig,
    pub player: PlayerConfig,
    pub consumers: ConsumersConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration by layering, in increasing priority: built-in
    /// defaults, an optional TOML file, then `FLEETLINK_`-prefixed
    /// environment variables (e.g. `FLEETLINK_TCP_ADDRESS`,
    /// `FLEETLINK_CONSUMERS_SAMPLE_DB_URI`).
    pub fn load(config_path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match config_path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
                toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?
            }
            None => Config::default(),
        };
        apply_env_overrides(&mut config);
        Ok(config)
    }
}

fn apply_env_overrides(config: &mut Config) {
    use std::env;

    macro_rules! overlay_str {
        ($key:expr, $target:expr) => {
            if let Ok(val) = env::var(format!("{ENV_PREFIX}{}", $key)) {
                $target = val;
            }
        };
    }
    macro_rules! overlay_parsed {
        ($key:expr, $target:expr) => {
            if let Ok(val) = env::var(format!("{ENV_PREFIX}{}", $key)) {
                if let Ok(parsed) = val.parse() {
                    $target = parsed;
                }
            }
        };
    }

    overlay_str!("TCP_ADDRESS", config.tcp.address);
    overlay_str!("TCP_PROTO", config.tcp.proto);
    overlay_parsed!("TCP_TIMEOUTS", config.tcp.timeouts);
    overlay_parsed!("TCP_SOCKET_REUSE_PORT", config.tcp.socket_reuse_port);
    overlay_parsed!("TCP_SOCKET_FAST_OPEN", config.tcp.socket_fast_open);
    overlay_parsed!("TCP_SOCKET_DEFER_ACCEPT", config.tcp.socket_defer_accept);
    overlay_parsed!("TCP_LOOPS", config.tcp.loops);
    overlay_parsed!("TCP_WORKERPOOL_SHARDS", config.tcp.workerpool_shards);
    overlay_parsed!("TCP_ALLOW_THREAD_LOCKING", config.tcp.allow_thread_locking);

    overlay_str!("PLAYER_ADDRESS", config.player.address);
    overlay_str!("PLAYER_PROTO", config.player.proto);
    overlay_str!("PLAYER_IN", config.player.in_path);
    overlay_str!("PLAYER_MASK", config.player.mask);
    overlay_parsed!("PLAYER_NUMS", config.player.nums);
    overlay_parsed!("PLAYER_DELAY", config.player.delay);
    overlay_parsed!("PLAYER_TIMEOUTS", config.player.timeouts);

    if let Ok(val) = env::var(format!("{ENV_PREFIX}CONSUMERS_SAMPLE_DB_URI")) {
        config.consumers.sample_db = Some(SampleDbConfig { uri: val });
    }

    overlay_parsed!("LOGGING_LEVEL", config.logging.level);
    overlay_parsed!("LOGGING_CONSOLE", config.logging.console);
    overlay_parsed!("LOGGING_NO_BLOCK", config.logging.no_block);
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}

fn protocol_by_name(name: &str) -> Result<Arc<dyn Protocol>, ConfigError> {
    match name {
        "egts" => Ok(Arc::new(EgtsProtocol::new())),
        "wialonips" => Ok(Arc::new(WialonIpsProtocol::new())),
        "detector" => Ok(Arc::new(DetectorProtocol::new(Vec::new()))),
        other => Err(ConfigError::UnknownProtocol(other.to_owned())),
    }
}

/// Parses a Go-`net`-style listen address (`:5001` meaning "all
/// interfaces") into a `SocketAddr`.
fn parse_listen_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let normalized = if let Some(port) = addr.strip_prefix(':') { format!("0.0.0.0:{port}") } else { addr.to_owned() };
    normalized.parse().map_err(|_| ConfigError::InvalidAddress(addr.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_to_valid_address() {
        let cfg = TcpConfig::default();
        assert_eq!(cfg.socket_addr().unwrap(), "0.0.0.0:5001".parse().unwrap());
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var("FLEETLINK_TCP_ADDRESS", ":7000");
        let config = Config::load(None).unwrap();
        assert_eq!(config.tcp.address, ":7000");
        std::env::remove_var("FLEETLINK_TCP_ADDRESS");
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        assert!(protocol_by_name("bogus").is_err());
    }
}
