//! Delivery lifecycle types.

use chat_event_record::EventRecord;
use chrono::{DateTime, Utc};
use rotating_log_sink::{EntryStatus, LogEntry};
use std::fmt;
use uuid::Uuid;
use webhook_delivery_client::AttemptOutcome;

/// Where a record is in its attempt sequence.
///
/// ```text
/// Pending -> Attempting(1) -> Succeeded
///                          -> RetryScheduled(2) -> Attempting(2) -> ...
///                          -> Exhausted
/// RetryScheduled(n) -> Cancelled   (shutdown)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Attempting(u32),
    RetryScheduled(u32),
    Succeeded,
    Exhausted,
    Cancelled,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Succeeded | DeliveryState::Exhausted | DeliveryState::Cancelled
        )
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::Pending => f.write_str("pending"),
            DeliveryState::Attempting(n) => write!(f, "attempting #{n}"),
            DeliveryState::RetryScheduled(n) => write!(f, "retry #{n} scheduled"),
            DeliveryState::Succeeded => f.write_str("succeeded"),
            DeliveryState::Exhausted => f.write_str("exhausted"),
            DeliveryState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One finished POST for a record.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub record_id: Uuid,
    /// 1-based.
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub occurred_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    /// The key log line for this attempt.
    pub fn log_entry(&self, body: &str) -> LogEntry {
        let status = match &self.outcome {
            AttemptOutcome::Success { status } => EntryStatus::Http(*status),
            failed => EntryStatus::Error(failed.failure_reason().unwrap_or_default()),
        };
        LogEntry::new(self.occurred_at, body, status)
    }
}

/// Terminal outcome of one record, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub record_id: Uuid,
    pub source_key: String,
    pub state: DeliveryState,
    /// Attempts actually made.
    pub attempts: u32,
}

impl DeliveryReport {
    pub(crate) fn new(record: &EventRecord, state: DeliveryState, attempts: u32) -> Self {
        Self {
            record_id: record.id(),
            source_key: record.source_key().to_string(),
            state,
            attempts,
        }
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ShuttingDown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ShuttingDown => f.write_str("relay is shutting down"),
        }
    }
}

/// Immediate answer to `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected(RejectReason),
}

impl SubmitStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitStatus::Accepted)
    }
}

/// What shutdown found and left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Records still in flight when shutdown began.
    pub in_flight_at_start: usize,
    /// Records whose scheduled retry was cancelled, over the scheduler's lifetime.
    pub cancelled: usize,
    /// Records still running when the grace period ran out.
    pub still_running: usize,
}

impl ShutdownSummary {
    pub fn drained(&self) -> bool {
        self.still_running == 0
    }
}
