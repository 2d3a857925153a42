//! Administrative log purging.
//!
//! Who may purge whose logs is decided by the command layer before it gets
//! here; this service only executes the request.

use crate::{LogSink, SinkResult};
use std::fmt;
use std::sync::Arc;

/// What to purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeTarget {
    /// One source key's log.
    Key(String),
    /// Every file the sink manages.
    All,
}

impl PurgeTarget {
    /// Parse a command argument: `all` (any case) or a source key.
    ///
    /// A key literally named "all" cannot be targeted on its own.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.eq_ignore_ascii_case("all") {
            Some(PurgeTarget::All)
        } else {
            Some(PurgeTarget::Key(raw.to_string()))
        }
    }
}

/// Result of a purge, phrased for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeReport {
    KeyRemoved { key: String },
    KeyNotFound { key: String },
    AllRemoved { files: usize },
}

impl fmt::Display for PurgeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeReport::KeyRemoved { key } => write!(f, "Log for {key} purged."),
            PurgeReport::KeyNotFound { key } => write!(f, "No log found for {key}."),
            PurgeReport::AllRemoved { files } => write!(f, "All logs purged ({files} files)."),
        }
    }
}

/// Façade over the sink's purge operations.
#[derive(Clone)]
pub struct PurgeService {
    sink: Arc<LogSink>,
}

impl PurgeService {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }

    pub fn purge(&self, target: &PurgeTarget) -> SinkResult<PurgeReport> {
        match target {
            PurgeTarget::Key(key) => self.purge_key(key),
            PurgeTarget::All => self.purge_all(),
        }
    }

    pub fn purge_key(&self, key: &str) -> SinkResult<PurgeReport> {
        let key = key.to_string();
        Ok(if self.sink.purge_key(&key)? {
            PurgeReport::KeyRemoved { key }
        } else {
            PurgeReport::KeyNotFound { key }
        })
    }

    pub fn purge_all(&self) -> SinkResult<PurgeReport> {
        Ok(PurgeReport::AllRemoved {
            files: self.sink.purge_all()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RotationPolicy, SinkSettings};
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> (Arc<LogSink>, PurgeService) {
        let sink = Arc::new(
            LogSink::new(SinkSettings {
                directory: dir.to_path_buf(),
                rotation: RotationPolicy {
                    max_bytes: 1_000,
                    max_generations: 3,
                },
            })
            .unwrap(),
        );
        (sink.clone(), PurgeService::new(sink))
    }

    #[test]
    fn parse_targets() {
        assert_eq!(PurgeTarget::parse("all"), Some(PurgeTarget::All));
        assert_eq!(PurgeTarget::parse(" ALL "), Some(PurgeTarget::All));
        assert_eq!(
            PurgeTarget::parse("Nova"),
            Some(PurgeTarget::Key("Nova".to_string()))
        );
        assert_eq!(PurgeTarget::parse("  "), None);
    }

    #[test]
    fn purge_key_reports_outcome() {
        let dir = tempdir().unwrap();
        let (sink, service) = service(dir.path());
        sink.append("Nova", "line").unwrap();

        let report = service.purge(&PurgeTarget::Key("Nova".into())).unwrap();
        assert_eq!(report, PurgeReport::KeyRemoved { key: "Nova".into() });
        assert_eq!(report.to_string(), "Log for Nova purged.");

        let again = service.purge_key("Nova").unwrap();
        assert_eq!(again, PurgeReport::KeyNotFound { key: "Nova".into() });
    }

    #[test]
    fn purge_all_counts_files() {
        let dir = tempdir().unwrap();
        let (sink, service) = service(dir.path());
        sink.append("Nova", "a").unwrap();
        sink.append_error("boom").unwrap();

        let report = service.purge(&PurgeTarget::All).unwrap();
        assert_eq!(report, PurgeReport::AllRemoved { files: 2 });
        assert_eq!(report.to_string(), "All logs purged (2 files).");
    }
}
