//! Configuration, paths and logging bootstrap for the chathook relay.

mod config;
mod error;
mod handle;
mod logging;
mod paths;

pub use config::{
    RelayConfig, RetryStrategy, DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_ERROR_LOG_BYTES, DEFAULT_MAX_ERROR_LOG_GENERATIONS, DEFAULT_MAX_RETRY_DELAY_MS,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_SENDER_FIELD, DEFAULT_TIMEOUT_MS,
};
pub use error::{ConfigError, ConfigResult};
pub use handle::ConfigHandle;
pub use logging::{init_logging, parse_level, SERVICE_NAME};
pub use paths::Paths;
