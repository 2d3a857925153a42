//! # Observability
//!
//! Logging bootstrap for the chathook relay.
//!
//! Components never configure logging themselves. They emit events through
//! the `tracing` macros and the binary calls [`init_with_config`] once at
//! startup. Two outputs are available:
//!
//! - a JSONL file (one JSON object per event) for operators who want to
//!   `tail -f` or `jq` the relay's own activity;
//! - a compact stderr stream for foreground runs.
//!
//! This is the operator console channel. It is separate from the delivery
//! audit logs the relay writes per source key.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "chathook".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/var/log/chathook/relay.jsonl".into()),
//!     ..Default::default()
//! });
//! tracing::info!("relay started");
//! ```

mod file_writer;
mod json_layer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::{JsonlFileWriter, JsonlWriterFactory};
pub use json_layer::{JsonlEntry, JsonlLayer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSONL entry.
    pub service_name: String,

    /// Default filter directive (e.g. "info", "webhook_retriable_worker=debug").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// JSONL output file. `None` disables file output.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable lines on stderr.
    /// Forced on when no file output could be installed.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless: later calls are ignored, which
/// keeps tests that share a process from panicking.
pub fn init_with_config(config: LogConfig) {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let mut open_failure: Option<(PathBuf, io::Error)> = None;
    let file_layer = match config.log_path.as_ref() {
        Some(path) => match JsonlFileWriter::open(path) {
            Ok(writer) => Some(
                JsonlLayer::new(config.service_name.clone(), JsonlWriterFactory::new(writer))
                    .with_filter(filter()),
            ),
            Err(err) => {
                open_failure = Some((path.clone(), err));
                None
            }
        },
        None => None,
    };

    let stderr_layer = (config.also_stderr || file_layer.is_none()).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(filter())
    });

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    if let Some((path, err)) = open_failure {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "Could not open JSONL log file, logging to stderr only"
        );
    }

    tracing::debug!(service = %config.service_name, "observability initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(config.also_stderr);
    }

    #[test]
    fn repeated_init_does_not_panic() {
        for name in ["first", "second"] {
            init_with_config(LogConfig {
                service_name: name.into(),
                ..Default::default()
            });
        }
    }
}
