//! Relay configuration.

use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Default number of attempts per record (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
/// Default cap for exponential backoff.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 30_000;
/// Default error log size before rotation (10 MB).
pub const DEFAULT_MAX_ERROR_LOG_BYTES: u64 = 10_000_000;
/// Default number of error log generations kept on disk.
pub const DEFAULT_MAX_ERROR_LOG_GENERATIONS: u32 = 5;
/// Default JSON field carrying the sender's name on the wire.
pub const DEFAULT_SENDER_FIELD: &str = "player";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVEL_ENV: &str = "CHATHOOK_LOG_LEVEL";

/// How the delay before attempt `n + 1` is derived from attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Always wait `retry_delay_ms`.
    #[default]
    Fixed,
    /// Wait `retry_delay_ms * 2^(n-1)`, capped at `max_retry_delay_ms`.
    Exponential,
}

/// Relay configuration.
///
/// `endpoint_url` has no default; a config without it does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Webhook URL every event is POSTed to.
    pub endpoint_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per record, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Delay formula.
    #[serde(default)]
    pub retry_strategy: RetryStrategy,
    /// Upper bound for exponential delays in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Directory holding per-key logs and the error log.
    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    /// Error log size that triggers rotation.
    #[serde(default = "default_max_error_log_bytes")]
    pub max_error_log_bytes: u64,
    /// Error log files kept on disk, active file included.
    #[serde(default = "default_max_error_log_generations")]
    pub max_error_log_generations: u32,
    /// JSON field name for the sender on the wire ("player", "username", "sender", ...).
    #[serde(default = "default_sender_field")]
    pub sender_field: String,
    /// Include full error chains in error log entries.
    #[serde(default)]
    pub debug: bool,
    /// Console log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_max_retry_delay_ms() -> u64 {
    DEFAULT_MAX_RETRY_DELAY_MS
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_error_log_bytes() -> u64 {
    DEFAULT_MAX_ERROR_LOG_BYTES
}

fn default_max_error_log_generations() -> u32 {
    DEFAULT_MAX_ERROR_LOG_GENERATIONS
}

fn default_sender_field() -> String {
    DEFAULT_SENDER_FIELD.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl RelayConfig {
    /// Create a config for `endpoint_url` with every optional setting at its default.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_strategy: RetryStrategy::Fixed,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            log_directory: default_log_directory(),
            max_error_log_bytes: DEFAULT_MAX_ERROR_LOG_BYTES,
            max_error_log_generations: DEFAULT_MAX_ERROR_LOG_GENERATIONS,
            sender_field: DEFAULT_SENDER_FIELD.to_string(),
            debug: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Load `config.json` from the relay's base directory.
    ///
    /// A missing file is an error; there is no default endpoint.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();
        if !config_path.exists() {
            return Err(ConfigError::Missing("config.json"));
        }
        Self::load_from_file(&config_path)
    }

    /// Load, resolve and validate a specific config file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: RelayConfig = serde_json::from_str(&content)?;

        if config.log_directory.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.log_directory = base.join(&config.log_directory);
        }

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate, then write the configuration to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment variables may only override the console log level.
    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.log_level = level.trim().to_string();
            }
        }
    }

    /// Check every setting; the first problem found is returned.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint_url"));
        }
        let url = self.endpoint()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "endpoint_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.retry_strategy == RetryStrategy::Exponential
            && self.max_retry_delay_ms < self.retry_delay_ms
        {
            return Err(invalid(
                "max_retry_delay_ms",
                "must not be smaller than retry_delay_ms",
            ));
        }
        if self.log_directory.as_os_str().is_empty() {
            return Err(ConfigError::Missing("log_directory"));
        }
        if self.max_error_log_bytes == 0 {
            return Err(invalid("max_error_log_bytes", "must be greater than 0"));
        }
        if self.max_error_log_generations == 0 {
            return Err(invalid("max_error_log_generations", "must be at least 1"));
        }
        if self.sender_field.trim().is_empty() {
            return Err(ConfigError::Missing("sender_field"));
        }
        if matches!(self.sender_field.as_str(), "id" | "message" | "timestamp") {
            return Err(invalid("sender_field", "collides with a reserved payload field"));
        }
        Ok(())
    }

    /// Parsed endpoint URL.
    pub fn endpoint(&self) -> ConfigResult<Url> {
        Url::parse(self.endpoint_url.trim()).map_err(ConfigError::from)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
