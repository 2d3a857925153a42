//! Delivery log line format: `[<timestamp>] <payload> → <status>`.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Status column of a delivery log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Delivered; the endpoint answered with this code.
    Http(u16),
    /// Attempt failed.
    Error(String),
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Http(code) => write!(f, "{code}"),
            EntryStatus::Error(reason) => write!(f, "ERROR: {reason}"),
        }
    }
}

/// One delivery log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub payload: String,
    pub status: EntryStatus,
}

impl LogEntry {
    pub fn new(at: DateTime<Utc>, payload: impl Into<String>, status: EntryStatus) -> Self {
        Self {
            at,
            payload: payload.into(),
            status,
        }
    }

    /// Render without the trailing newline. Embedded line breaks are
    /// flattened so one entry is always one line.
    pub fn render(&self) -> String {
        single_line(&format!(
            "[{}] {} → {}",
            format_timestamp(self.at),
            self.payload,
            self.status
        ))
    }
}

/// Render a free-form error log line: `[<timestamp>] <body>`.
pub fn error_line(at: DateTime<Utc>, body: &str) -> String {
    single_line(&format!("[{}] {}", format_timestamp(at), body))
}

/// Timestamp format shared by every line the sink writes.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn renders_success_with_status_code() {
        let entry = LogEntry::new(at(), r#"{"player":"Nova"}"#, EntryStatus::Http(200));
        assert_eq!(
            entry.render(),
            r#"[2025-06-01T12:00:00.000000Z] {"player":"Nova"} → 200"#
        );
    }

    #[test]
    fn renders_error_reason() {
        assert_eq!(
            EntryStatus::Error("HTTP 503".into()).to_string(),
            "ERROR: HTTP 503"
        );
    }

    #[test]
    fn flattens_line_breaks() {
        let entry = LogEntry::new(
            at(),
            "{}",
            EntryStatus::Error("connection reset\nby peer\r\n".into()),
        );
        let rendered = entry.render();
        assert!(!rendered.contains('\n'));
        assert!(!rendered.contains('\r'));
        assert!(rendered.ends_with("ERROR: connection reset by peer "));
    }

    #[test]
    fn error_line_prefixes_timestamp() {
        assert_eq!(
            error_line(at(), r#"{"event":"delivery_exhausted"}"#),
            r#"[2025-06-01T12:00:00.000000Z] {"event":"delivery_exhausted"}"#
        );
    }
}
