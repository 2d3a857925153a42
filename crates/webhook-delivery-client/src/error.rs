//! Delivery error types.

use thiserror::Error;

/// Why a single POST did not succeed.
///
/// These never leave the relay as errors: the client folds them into an
/// [`AttemptOutcome`](crate::AttemptOutcome) and the scheduler decides
/// whether to retry.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connection, TLS, timeout or body transfer failure.
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The shared HTTP client could not be built.
    #[error("HTTP client initialization failed: {0}")]
    ClientInit(String),
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|inner| inner as _)
        }
    }

    #[test]
    fn status_display() {
        let err = DeliveryError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "Endpoint returned 503: maintenance");
    }

    #[test]
    fn chain_joins_sources() {
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer(
                "connection refused",
                Some(Box::new(Layer("os error 111", None))),
            ))),
        );
        assert_eq!(
            error_chain(&err),
            "error sending request: connection refused: os error 111"
        );
    }
}
