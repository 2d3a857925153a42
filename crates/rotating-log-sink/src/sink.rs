//! The log sink: per-key append logs plus the shared error log.

use crate::entry::LogEntry;
use crate::naming::{error_log_file_name, is_error_log_file, is_managed_file, key_file_name};
use crate::rotation::{file_size, rotate_if_needed, RotationPolicy, RotationState};
use crate::{SinkError, SinkResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the sink writes and how the error log rotates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    pub directory: PathBuf,
    pub rotation: RotationPolicy,
}

impl SinkSettings {
    fn validate(&self) -> SinkResult<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(SinkError::InvalidSettings("empty log directory".into()));
        }
        if self.rotation.max_bytes == 0 {
            return Err(SinkError::InvalidSettings("max_bytes must be > 0".into()));
        }
        if self.rotation.max_generations == 0 {
            return Err(SinkError::InvalidSettings(
                "max_generations must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Path of the log file for `key` under these settings.
    pub fn key_log_path(&self, key: &str) -> PathBuf {
        self.directory.join(key_file_name(key))
    }

    /// Path of the active error log under these settings.
    pub fn error_log_path(&self) -> PathBuf {
        self.directory.join(error_log_file_name())
    }
}

type FileLock = Arc<Mutex<()>>;

/// Append-only delivery log store.
///
/// Appends to one file are serialized by a lock dedicated to that file;
/// appends to different files proceed in parallel. Error log backups share
/// the active error log's lock, so a rotation never races an error append
/// or a purge. A file's lock lives only while someone holds or waits on it.
///
/// The sink keeps current settings for callers that do not care which
/// directory they write to. The `*_in` methods take explicit settings
/// instead, so a caller holding an older snapshot keeps writing where that
/// snapshot points even after [`LogSink::apply_settings`].
///
/// Per-key logs are never rotated and grow without bound.
pub struct LogSink {
    settings: RwLock<SinkSettings>,
    file_locks: Mutex<HashMap<PathBuf, FileLock>>,
}

impl LogSink {
    /// Create a sink, making sure its directory exists.
    pub fn new(settings: SinkSettings) -> SinkResult<Self> {
        settings.validate()?;
        ensure_dir(&settings.directory)?;
        Ok(Self {
            settings: RwLock::new(settings),
            file_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> SinkSettings {
        self.settings.read().clone()
    }

    /// Swap directory and rotation settings. Later writes that do not pass
    /// their own settings use the new values.
    pub fn apply_settings(&self, settings: SinkSettings) -> SinkResult<()> {
        settings.validate()?;
        ensure_dir(&settings.directory)?;
        let mut current = self.settings.write();
        if *current != settings {
            info!(
                directory = %settings.directory.display(),
                max_bytes = settings.rotation.max_bytes,
                max_generations = settings.rotation.max_generations,
                "Log sink settings updated"
            );
            *current = settings;
        }
        Ok(())
    }

    pub fn directory(&self) -> PathBuf {
        self.settings.read().directory.clone()
    }

    /// Path of the log file for `key`.
    pub fn key_log_path(&self, key: &str) -> PathBuf {
        self.settings.read().key_log_path(key)
    }

    /// Path of the active error log.
    pub fn error_log_path(&self) -> PathBuf {
        self.settings.read().error_log_path()
    }

    /// Append one line to `key`'s log, waiting for the file lock.
    pub fn append(&self, key: &str, line: &str) -> SinkResult<()> {
        self.append_in(&self.settings(), key, line)
    }

    /// [`LogSink::append`] under explicit settings.
    pub fn append_in(&self, settings: &SinkSettings, key: &str, line: &str) -> SinkResult<()> {
        let path = settings.key_log_path(key);
        self.locked(&path, || write_line(&path, line))
    }

    /// Append to `key`'s log only if its lock is free right now.
    ///
    /// Returns `Ok(false)` when the line was skipped.
    pub fn try_append(&self, key: &str, line: &str) -> SinkResult<bool> {
        self.try_append_in(&self.settings(), key, line)
    }

    /// [`LogSink::try_append`] under explicit settings.
    pub fn try_append_in(&self, settings: &SinkSettings, key: &str, line: &str) -> SinkResult<bool> {
        let path = settings.key_log_path(key);
        self.try_locked(&path, || write_line(&path, line))
    }

    /// Append one delivery attempt to `key`'s log.
    pub fn append_attempt(&self, key: &str, entry: &LogEntry) -> SinkResult<()> {
        self.append(key, &entry.render())
    }

    /// [`LogSink::append_attempt`] under explicit settings.
    pub fn append_attempt_in(
        &self,
        settings: &SinkSettings,
        key: &str,
        entry: &LogEntry,
    ) -> SinkResult<()> {
        self.append_in(settings, key, &entry.render())
    }

    /// Non-blocking variant of [`LogSink::append_attempt`].
    pub fn try_append_attempt(&self, key: &str, entry: &LogEntry) -> SinkResult<bool> {
        self.try_append(key, &entry.render())
    }

    /// [`LogSink::try_append_attempt`] under explicit settings.
    pub fn try_append_attempt_in(
        &self,
        settings: &SinkSettings,
        key: &str,
        entry: &LogEntry,
    ) -> SinkResult<bool> {
        self.try_append_in(settings, key, &entry.render())
    }

    /// Append one line to the shared error log, rotating first if needed.
    pub fn append_error(&self, line: &str) -> SinkResult<()> {
        self.append_error_in(&self.settings(), line)
    }

    /// [`LogSink::append_error`] under explicit settings.
    pub fn append_error_in(&self, settings: &SinkSettings, line: &str) -> SinkResult<()> {
        settings.validate()?;
        let path = settings.error_log_path();
        self.locked(&path, || write_error_locked(settings, &path, line))
    }

    /// Non-blocking variant of [`LogSink::append_error`].
    pub fn try_append_error(&self, line: &str) -> SinkResult<bool> {
        self.try_append_error_in(&self.settings(), line)
    }

    /// [`LogSink::try_append_error`] under explicit settings.
    pub fn try_append_error_in(&self, settings: &SinkSettings, line: &str) -> SinkResult<bool> {
        settings.validate()?;
        let path = settings.error_log_path();
        self.try_locked(&path, || write_error_locked(settings, &path, line))
    }

    /// Current size and limits of the error log.
    pub fn error_log_state(&self) -> SinkResult<RotationState> {
        let settings = self.settings();
        Ok(RotationState {
            current_size_bytes: file_size(&settings.error_log_path())?,
            max_bytes: settings.rotation.max_bytes,
            max_generations: settings.rotation.max_generations,
        })
    }

    /// Delete `key`'s log. Returns whether a file existed.
    pub fn purge_key(&self, key: &str) -> SinkResult<bool> {
        let path = self.key_log_path(key);
        let removed = self.locked(&path, || remove_file(&path))?;
        if removed {
            info!(key = %key, path = %path.display(), "Purged key log");
        }
        Ok(removed)
    }

    /// Delete every file the sink manages: key logs, the error log and its
    /// backups. Returns how many files were removed.
    pub fn purge_all(&self) -> SinkResult<usize> {
        let dir = self.directory();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(SinkError::io(&dir, err)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|err| SinkError::io(&dir, err))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_managed_file(name) || !entry.path().is_file() {
                continue;
            }

            let path = entry.path();
            let guard_path = if is_error_log_file(name) {
                dir.join(error_log_file_name())
            } else {
                path.clone()
            };
            if self.locked(&guard_path, || remove_file(&path))? {
                removed += 1;
            }
        }

        info!(directory = %dir.display(), removed, "Purged all logs");
        Ok(removed)
    }

    /// Run `op` holding `path`'s lock.
    fn locked<T>(&self, path: &Path, op: impl FnOnce() -> SinkResult<T>) -> SinkResult<T> {
        let lock = self.lock_for(path);
        let result = {
            let _guard = lock.lock();
            op()
        };
        self.release(path, lock);
        result
    }

    /// Run `op` only if `path`'s lock is free. `Ok(false)` when skipped.
    fn try_locked(&self, path: &Path, op: impl FnOnce() -> SinkResult<()>) -> SinkResult<bool> {
        let lock = self.lock_for(path);
        let result = match lock.try_lock() {
            Some(_guard) => op().map(|()| true),
            None => Ok(false),
        };
        self.release(path, lock);
        result
    }

    fn lock_for(&self, path: &Path) -> FileLock {
        self.file_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Drop `path`'s map entry once no other caller holds or waits on it.
    fn release(&self, path: &Path, lock: FileLock) {
        let mut locks = self.file_locks.lock();
        // The map's copy plus ours.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.file_locks.lock().len()
    }
}

fn write_error_locked(settings: &SinkSettings, path: &Path, line: &str) -> SinkResult<()> {
    let incoming = line.len() as u64 + 1;
    if rotate_if_needed(&settings.directory, incoming, &settings.rotation)? {
        debug!(path = %path.display(), "Rotated error log");
    }
    write_line(path, line)
}

fn ensure_dir(dir: &Path) -> SinkResult<()> {
    fs::create_dir_all(dir).map_err(|err| SinkError::io(dir, err))
}

/// Write `line` plus a newline with a single `write_all` on an append handle,
/// recreating the directory if it vanished underneath us.
fn write_line(path: &Path, line: &str) -> SinkResult<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line.trim_end_matches(['\n', '\r']));
    buf.push('\n');

    let open = || OpenOptions::new().create(true).append(true).open(path);
    let mut file = match open() {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                ensure_dir(parent)?;
            }
            open().map_err(|err| SinkError::io(path, err))?
        }
        Err(err) => return Err(SinkError::io(path, err)),
    };

    file.write_all(buf.as_bytes())
        .map_err(|err| SinkError::io(path, err))
}

fn remove_file(path: &Path) -> SinkResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SinkError::io(path, err)),
    }
}
