//! Scheduler error types.

use chathook_config_and_utils::ConfigError;
use rotating_log_sink::SinkError;
use thiserror::Error;

/// Errors surfaced by scheduler construction and reloads.
///
/// Delivery failures are never errors here: they end up in the logs and in
/// the record's [`DeliveryReport`](crate::DeliveryReport).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Log sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Result type alias using SchedulerError.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
