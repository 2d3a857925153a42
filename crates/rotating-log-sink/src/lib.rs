//! Durable delivery logs for the chathook relay.
//!
//! - **[`LogSink`]**: one append-only file per source key plus a shared
//!   `error.log`, each guarded by its own lock.
//! - **Rotation**: the error log is kept as a fixed ring of numbered
//!   backups (`error.1.log` newest).
//! - **[`PurgeService`]**: administrative deletion of one key's log or of
//!   everything the sink manages.
//!
//! The sink is constructed explicitly and shared as `Arc<LogSink>`; all of
//! its methods are synchronous, so async callers should run them on a
//! blocking thread.

mod entry;
mod error;
mod naming;
mod purge;
mod rotation;
mod sink;

pub use entry::{error_line, format_timestamp, EntryStatus, LogEntry};
pub use error::{SinkError, SinkResult};
pub use naming::{error_backup_file_name, error_log_file_name, key_file_name};
pub use purge::{PurgeReport, PurgeService, PurgeTarget};
pub use rotation::{backup_path, RotationPolicy, RotationState};
pub use sink::{LogSink, SinkSettings};
