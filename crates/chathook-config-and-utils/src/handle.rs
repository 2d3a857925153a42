//! Atomically swappable configuration snapshot.

use crate::{ConfigResult, RelayConfig};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to the current [`RelayConfig`].
///
/// Readers take a snapshot (an `Arc` clone) and keep using it for as long as
/// they need; a reload swaps in a new `Arc` without touching snapshots that
/// are already out.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<RelayConfig>>>,
}

impl ConfigHandle {
    /// Validate `config` and wrap it in a handle.
    pub fn new(config: RelayConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// The configuration in force right now.
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        self.current.read().clone()
    }

    /// Validate and install `config`, returning the snapshot it replaced.
    ///
    /// On validation failure the current configuration stays in force.
    pub fn replace(&self, config: RelayConfig) -> ConfigResult<Arc<RelayConfig>> {
        config.validate()?;
        let mut guard = self.current.write();
        Ok(std::mem::replace(&mut *guard, Arc::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_config() {
        assert!(ConfigHandle::new(RelayConfig::new("")).is_err());
    }

    #[test]
    fn snapshots_survive_replace() {
        let handle = ConfigHandle::new(RelayConfig::new("https://a.example/hook")).unwrap();
        let before = handle.snapshot();

        let previous = handle
            .replace(RelayConfig::new("https://b.example/hook"))
            .unwrap();

        assert_eq!(before.endpoint_url, "https://a.example/hook");
        assert_eq!(previous.endpoint_url, "https://a.example/hook");
        assert_eq!(handle.snapshot().endpoint_url, "https://b.example/hook");
    }

    #[test]
    fn failed_replace_keeps_current() {
        let handle = ConfigHandle::new(RelayConfig::new("https://a.example/hook")).unwrap();
        let mut bad = RelayConfig::new("https://b.example/hook");
        bad.max_attempts = 0;

        assert!(handle.replace(bad).is_err());
        assert_eq!(handle.snapshot().endpoint_url, "https://a.example/hook");
    }

    #[test]
    fn clones_share_state() {
        let handle = ConfigHandle::new(RelayConfig::new("https://a.example/hook")).unwrap();
        let other = handle.clone();
        other
            .replace(RelayConfig::new("https://c.example/hook"))
            .unwrap();
        assert_eq!(handle.snapshot().endpoint_url, "https://c.example/hook");
    }
}
