//! Structured logging for the CLI.
//!
//! Logs go to stderr so they never mix with reports written to stdout.
//! `RUST_LOG` wins over the verbosity flags when it is set.

use crate::config::Verbosity;
use crate::error::{CliError, CliResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Filter from `RUST_LOG`, falling back to the verbosity default
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()))
}

/// Install the global subscriber; call once, early in `main`
pub fn init(verbosity: Verbosity, format: LogFormat) -> CliResult<()> {
    let filter = env_filter(verbosity);
    let layer = match format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| CliError::config(format!("logging already initialized: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init(Verbosity::Quiet, LogFormat::Text);
        assert!(init(Verbosity::Quiet, LogFormat::Json).is_err());
    }
}
