//! Log sink error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the log sink.
///
/// Write failures are never fatal to a delivery; callers report them on the
/// console channel and carry on.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Filesystem error on a specific log file or directory.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory or rotation settings are unusable.
    #[error("Invalid sink settings: {0}")]
    InvalidSettings(String),
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using SinkError.
pub type SinkResult<T> = Result<T, SinkError>;
