//! Structured logging setup

use meetlink_core::MeetLinkError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    /// Initialize logging at `info`, or whatever `RUST_LOG` says
    pub fn init_logging() -> Result<(), MeetLinkError> {
        Self::init_with_level("info")
    }

    /// Initialize logging with `default_level` as the fallback filter.
    ///
    /// `RUST_LOG` takes precedence when set. Calling this after a subscriber
    /// is already installed is a no-op.
    pub fn init_with_level(default_level: &str) -> Result<(), MeetLinkError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_level).map_err(|e| {
                MeetLinkError::InvalidConfiguration {
                    message: format!("invalid log filter '{}': {}", default_level, e),
                }
            })?,
        };

        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_err()
        {
            debug!("Logging already initialized");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_init_is_idempotent() {
        assert_ok!(DebugLogger::init_logging());
        assert_ok!(DebugLogger::init_with_level("debug"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(DebugLogger::init_with_level("meetlink=loud").is_err());
    }
}
