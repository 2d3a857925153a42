//! File system paths for the relay.

use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Manages file system paths for the relay.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for relay files (~/.chathook)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.chathook`.
    pub fn new() -> ConfigResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".chathook"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the config file path (~/.chathook/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the relay's own JSONL trace file (~/.chathook/relay.jsonl).
    ///
    /// Kept outside `logs/` so purging delivery logs never touches it.
    pub fn trace_file(&self) -> PathBuf {
        self.base_dir.join("relay.jsonl")
    }
}
