//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating relay configuration.
///
/// All of these are fatal at startup: the relay refuses to accept
/// submissions rather than fall back to a default for a required setting.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but out of range or malformed.
    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    /// IO error while reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The config file is not valid JSON or misses a required key.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_display_names_the_field() {
        let err = ConfigError::Missing("endpoint_url");
        assert_eq!(err.to_string(), "Missing required setting: endpoint_url");
    }

    #[test]
    fn invalid_display_includes_reason() {
        let err = ConfigError::Invalid {
            field: "max_attempts",
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid setting max_attempts: must be at least 1"
        );
    }
}
