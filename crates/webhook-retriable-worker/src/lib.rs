//! # Webhook delivery scheduler
//!
//! Turns event records into webhook POSTs without ever blocking the thread
//! that produced them.
//!
//! ```text
//! host thread ──submit──▶ DeliveryScheduler ──spawn──▶ worker task (one per record)
//!                                                         │
//!                              ┌──────────────────────────┤ up to max_attempts
//!                              ▼                          ▼
//!                       WebhookTransport              LogSink
//!                       (HTTP POST)           (<key>.log, error.log)
//! ```
//!
//! - Every attempt appends one line to the record's key log.
//! - A record that runs out of attempts also gets one structured entry in
//!   the shared error log.
//! - Retries wait a fixed or exponentially growing delay, per config.
//! - Config reloads swap an atomic snapshot; in-flight records keep the one
//!   they captured at submission.
//! - Shutdown rejects new records and cancels pending retries.

mod error;
mod policy;
mod scheduler;
mod state;

pub use error::{SchedulerError, SchedulerResult};
pub use policy::RetryPolicy;
pub use scheduler::{sink_settings, DeliveryScheduler};
pub use state::{
    DeliveryAttempt, DeliveryReport, DeliveryState, RejectReason, ShutdownSummary, SubmitStatus,
};
