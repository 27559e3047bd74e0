// ABOUTME: Structured logging setup, mirroring the original project's zerolog bootstrap
// ABOUTME: Controlled by the logging.level / logging.console config keys

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Installs the global `tracing` subscriber. `console` selects a
/// human-readable writer on stderr (suited to an interactive terminal);
/// otherwise structured logging is left to `tracing`'s default formatter.
pub fn init(level: LogLevel, console: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if console {
        builder.with_ansi(true).with_writer(std::io::stderr).init();
    } else {
        builder.with_ansi(false).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_strings_are_lowercase_level_names() {
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
        assert_eq!(LogLevel::default().as_filter_str(), "info");
    }

    #[tracing_test::traced_test]
    #[test]
    fn session_span_fields_are_captured() {
        let span = tracing::info_span!("session", id = "abcd1234", proto = "egts");
        let _enter = span.enter();
        tracing::debug!("session opened");
        assert!(logs_contain("session opened"));
    }
}
