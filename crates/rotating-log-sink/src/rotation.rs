//! Numbered-backup rotation for the shared error log.
//!
//! `error.log` is the active file; `error.1.log` .. `error.<G-1>.log` are
//! backups with `1` the most recent. At most `G` files exist at once.

use crate::naming::{error_backup_file_name, error_log_file_name};
use crate::{SinkError, SinkResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Size limit and ring length for a rotated log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Active file size that forces a rotation before the next write.
    pub max_bytes: u64,
    /// Files kept on disk, active file included. Must be at least 1.
    pub max_generations: u32,
}

/// Observed rotation state of the error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationState {
    pub current_size_bytes: u64,
    pub max_bytes: u64,
    pub max_generations: u32,
}

impl RotationPolicy {
    /// Whether writing `incoming` more bytes onto a file of `current` bytes
    /// must be preceded by a rotation.
    ///
    /// An empty file never rotates, so a single oversized line still lands.
    pub fn needs_rotation(&self, current: u64, incoming: u64) -> bool {
        current > 0 && current.saturating_add(incoming) > self.max_bytes
    }
}

/// Path of backup `generation` next to the active error log in `dir`.
pub fn backup_path(dir: &Path, generation: u32) -> PathBuf {
    dir.join(error_backup_file_name(generation))
}

pub(crate) fn file_size(path: &Path) -> SinkResult<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
        Err(err) => Err(SinkError::io(path, err)),
    }
}

/// Rotate the error log in `dir` if writing `incoming` bytes would overflow it.
///
/// Returns whether a rotation happened. Caller must hold the error log lock.
pub(crate) fn rotate_if_needed(
    dir: &Path,
    incoming: u64,
    policy: &RotationPolicy,
) -> SinkResult<bool> {
    let active = dir.join(error_log_file_name());
    if !policy.needs_rotation(file_size(&active)?, incoming) {
        return Ok(false);
    }
    rotate(dir, policy.max_generations)?;
    Ok(true)
}

fn rotate(dir: &Path, generations: u32) -> SinkResult<()> {
    let active = dir.join(error_log_file_name());

    if generations <= 1 {
        return remove_if_exists(&active);
    }

    remove_if_exists(&backup_path(dir, generations - 1))?;

    for generation in (1..generations - 1).rev() {
        let from = backup_path(dir, generation);
        if from.exists() {
            let to = backup_path(dir, generation + 1);
            fs::rename(&from, &to).map_err(|err| SinkError::io(&from, err))?;
        }
    }

    fs::rename(&active, backup_path(dir, 1)).map_err(|err| SinkError::io(&active, err))
}

fn remove_if_exists(path: &Path) -> SinkResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SinkError::io(path, err)),
    }
}
