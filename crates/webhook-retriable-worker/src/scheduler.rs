//! The delivery scheduler.

use crate::error::SchedulerResult;
use crate::policy::RetryPolicy;
use crate::state::{
    DeliveryAttempt, DeliveryReport, DeliveryState, RejectReason, ShutdownSummary, SubmitStatus,
};
use chat_event_record::{EventListener, EventRecord};
use chathook_config_and_utils::{ConfigHandle, RelayConfig};
use chrono::Utc;
use rotating_log_sink::{error_line, LogEntry, LogSink, RotationPolicy, SinkSettings};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, warn};
use webhook_delivery_client::{WebhookTransport, WirePayload};

/// Capacity of the terminal report broadcast channel.
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Sink settings derived from a relay config.
pub fn sink_settings(config: &RelayConfig) -> SinkSettings {
    SinkSettings {
        directory: config.log_directory.clone(),
        rotation: RotationPolicy {
            max_bytes: config.max_error_log_bytes,
            max_generations: config.max_error_log_generations,
        },
    }
}

#[derive(Serialize)]
struct ExhaustedEntry<'a> {
    event: &'static str,
    id: String,
    source_key: &'a str,
    attempts: u32,
    endpoint: &'a str,
    reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct WriteFailedEntry<'a> {
    event: &'static str,
    file: String,
    reason: &'a str,
}

struct Shared {
    config: ConfigHandle,
    sink: Arc<LogSink>,
    transport: Arc<dyn WebhookTransport>,
    shutdown: watch::Sender<bool>,
    in_flight: AtomicUsize,
    cancelled: AtomicUsize,
    idle: Notify,
    reports: broadcast::Sender<DeliveryReport>,
}

/// Accepts event records and delivers each one in the background.
///
/// `submit` only captures the current config snapshot and spawns a task on
/// the stored runtime handle, so it can be called from any thread without
/// blocking it. Each record then gets up to `max_attempts` sequential POSTs;
/// every attempt is appended to the record's key log and an exhausted
/// record also gets one entry in the shared error log.
///
/// Cloning is cheap and yields a handle to the same scheduler.
#[derive(Clone)]
pub struct DeliveryScheduler {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl DeliveryScheduler {
    /// Validate `config`, point `sink` at its log directory and build the scheduler.
    pub fn new(
        config: RelayConfig,
        sink: Arc<LogSink>,
        transport: Arc<dyn WebhookTransport>,
        runtime: Handle,
    ) -> SchedulerResult<Self> {
        let config = ConfigHandle::new(config)?;
        let snapshot = config.snapshot();
        sink.apply_settings(sink_settings(&snapshot))?;

        let (shutdown, _) = watch::channel(false);
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        info!(
            endpoint = %snapshot.endpoint_url,
            max_attempts = snapshot.max_attempts,
            retry_strategy = ?snapshot.retry_strategy,
            log_directory = %snapshot.log_directory.display(),
            "Delivery scheduler ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                sink,
                transport,
                shutdown,
                in_flight: AtomicUsize::new(0),
                cancelled: AtomicUsize::new(0),
                idle: Notify::new(),
                reports,
            }),
            runtime,
        })
    }

    /// Queue `record` for delivery and return immediately.
    pub fn submit(&self, record: EventRecord) -> SubmitStatus {
        if self.is_shutting_down() {
            warn!(
                id = %record.id(),
                source_key = %record.source_key(),
                "Rejected event: relay is shutting down"
            );
            return SubmitStatus::Rejected(RejectReason::ShuttingDown);
        }

        let config = self.shared.config.snapshot();
        let shutdown = self.shared.shutdown.subscribe();
        let shared = self.shared.clone();
        shared.in_flight.fetch_add(1, Ordering::SeqCst);

        debug!(
            id = %record.id(),
            source_key = %record.source_key(),
            state = %DeliveryState::Pending,
            "Event accepted"
        );

        self.runtime.spawn(async move {
            let report = deliver(&shared, record, config, shutdown).await;
            // No subscribers is fine.
            let _ = shared.reports.send(report);
            if shared.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                shared.idle.notify_waiters();
            }
        });

        SubmitStatus::Accepted
    }

    /// Receive a report for every record that reaches a terminal state.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryReport> {
        self.shared.reports.subscribe()
    }

    /// Records accepted but not yet terminal.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.in_flight() == 0;
            }
        }
    }

    /// The config snapshot new submissions will capture.
    pub fn config(&self) -> Arc<RelayConfig> {
        self.shared.config.snapshot()
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.shared.sink
    }

    /// Validate and install `config` for every later submission.
    ///
    /// Records already in flight keep the snapshot they captured, including
    /// its log directory and rotation limits. On error nothing changes.
    pub fn reload(&self, config: RelayConfig) -> SchedulerResult<()> {
        config.validate()?;
        self.shared.sink.apply_settings(sink_settings(&config))?;
        let previous = self.shared.config.replace(config)?;
        let current = self.shared.config.snapshot();

        info!(
            endpoint = %current.endpoint_url,
            previous_endpoint = %previous.endpoint_url,
            max_attempts = current.max_attempts,
            "Relay configuration reloaded"
        );
        Ok(())
    }

    /// Load `path` and [`reload`](Self::reload) it.
    pub fn reload_from_file(&self, path: &Path) -> SchedulerResult<()> {
        let config = RelayConfig::load_from_file(path)?;
        self.reload(config)
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Stop accepting records, cancel scheduled retries and give running
    /// attempts up to `grace` to finish.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownSummary {
        let in_flight_at_start = self.in_flight();
        if !self.shared.shutdown.send_replace(true) {
            info!(
                in_flight = in_flight_at_start,
                grace_ms = grace.as_millis() as u64,
                "Delivery scheduler shutting down"
            );
        }

        let drained = self.wait_idle(grace).await;
        let summary = ShutdownSummary {
            in_flight_at_start,
            cancelled: self.shared.cancelled.load(Ordering::SeqCst),
            still_running: self.in_flight(),
        };

        if drained {
            info!(cancelled = summary.cancelled, "Delivery scheduler stopped");
        } else {
            warn!(
                still_running = summary.still_running,
                "Grace period ended with deliveries still running"
            );
        }
        summary
    }
}

impl EventListener for DeliveryScheduler {
    fn on_event(&self, record: EventRecord) {
        self.submit(record);
    }
}

async fn deliver(
    shared: &Shared,
    record: EventRecord,
    config: Arc<RelayConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> DeliveryReport {
    let policy = RetryPolicy::from_config(&config);
    let settings = sink_settings(&config);
    let id = record.id();
    let key = record.source_key().to_string();

    let body = match WirePayload::from_record(&record, &config.sender_field).to_json() {
        Ok(body) => body,
        Err(err) => {
            let reason = format!("payload serialization failed: {err}");
            warn!(%id, source_key = %key, error = %err, "Could not serialize event");
            record_exhaustion(shared, &settings, &record, &config, 0, &[reason]).await;
            return DeliveryReport::new(&record, DeliveryState::Exhausted, 0);
        }
    };

    if *shutdown.borrow() {
        return cancel(shared, &record, 0);
    }

    let endpoint = config.endpoint_url.trim();
    let mut failures: Vec<String> = Vec::new();
    let mut attempt_number = 0;

    loop {
        attempt_number += 1;
        debug!(%id, state = %DeliveryState::Attempting(attempt_number), "Posting event");

        let outcome = shared
            .transport
            .send(endpoint, &body, config.timeout())
            .await;
        let attempt = DeliveryAttempt {
            record_id: id,
            attempt_number,
            outcome,
            occurred_at: Utc::now(),
        };
        write_attempt(shared, &settings, &key, attempt.log_entry(&body), &shutdown).await;

        let Some(reason) = attempt.outcome.failure_reason() else {
            info!(
                %id,
                source_key = %key,
                attempt = attempt_number,
                status = attempt.outcome.status(),
                "Event delivered"
            );
            return DeliveryReport::new(&record, DeliveryState::Succeeded, attempt_number);
        };

        warn!(
            %id,
            source_key = %key,
            attempt = attempt_number,
            max_attempts = policy.max_attempts,
            reason = %reason,
            "Delivery attempt failed"
        );
        failures.push(reason);

        if !policy.has_attempts_left(attempt_number) {
            break;
        }

        let delay = policy.delay_for(attempt_number);
        debug!(
            %id,
            state = %DeliveryState::RetryScheduled(attempt_number + 1),
            delay_ms = delay.as_millis() as u64,
            "Retry scheduled"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_signalled(&mut shutdown) => {
                return cancel(shared, &record, attempt_number);
            }
        }
    }

    record_exhaustion(shared, &settings, &record, &config, attempt_number, &failures).await;
    DeliveryReport::new(&record, DeliveryState::Exhausted, attempt_number)
}

async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

fn cancel(shared: &Shared, record: &EventRecord, attempts: u32) -> DeliveryReport {
    shared.cancelled.fetch_add(1, Ordering::SeqCst);
    info!(
        id = %record.id(),
        source_key = %record.source_key(),
        attempts,
        "Scheduled retry cancelled by shutdown"
    );
    DeliveryReport::new(record, DeliveryState::Cancelled, attempts)
}

/// Append one attempt line under the delivery's own settings snapshot.
///
/// Once shutdown has begun the write is skipped rather than queued behind a
/// contended file lock.
async fn write_attempt(
    shared: &Shared,
    settings: &SinkSettings,
    key: &str,
    entry: LogEntry,
    shutdown: &watch::Receiver<bool>,
) {
    let stopping = *shutdown.borrow();
    let sink = shared.sink.clone();
    let owned_settings = settings.clone();
    let owned_key = key.to_string();

    let result = tokio::task::spawn_blocking(move || {
        if stopping {
            sink.try_append_attempt_in(&owned_settings, &owned_key, &entry)
        } else {
            sink.append_attempt_in(&owned_settings, &owned_key, &entry)
                .map(|()| true)
        }
    })
    .await;

    match result {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => debug!(source_key = %key, "Skipped contended key log write during shutdown"),
        Ok(Err(err)) => {
            warn!(source_key = %key, error = %err, "Failed to write delivery log");
            let file = settings.key_log_path(key);
            report_write_failure(shared, settings, &file, err.to_string()).await;
        }
        Err(err) => warn!(source_key = %key, error = %err, "Delivery log writer task failed"),
    }
}

async fn report_write_failure(
    shared: &Shared,
    settings: &SinkSettings,
    file: &Path,
    reason: String,
) {
    let entry = WriteFailedEntry {
        event: "log_write_failed",
        file: file.display().to_string(),
        reason: &reason,
    };
    match serde_json::to_string(&entry) {
        Ok(json) => write_error_line(shared, settings, error_line(Utc::now(), &json), true).await,
        Err(err) => warn!(error = %err, "Could not encode log write failure"),
    }
}

async fn record_exhaustion(
    shared: &Shared,
    settings: &SinkSettings,
    record: &EventRecord,
    config: &RelayConfig,
    attempts: u32,
    failures: &[String],
) {
    let reason = failures.last().map(String::as_str).unwrap_or("unknown");
    warn!(
        id = %record.id(),
        source_key = %record.source_key(),
        attempts,
        reason = %reason,
        "Delivery exhausted"
    );

    let detail = config.debug.then(|| {
        failures
            .iter()
            .enumerate()
            .map(|(i, failure)| format!("attempt {}: {}", i + 1, failure))
            .collect::<Vec<_>>()
            .join("; ")
    });
    let entry = ExhaustedEntry {
        event: "delivery_exhausted",
        id: record.id().to_string(),
        source_key: record.source_key(),
        attempts,
        endpoint: config.endpoint_url.trim(),
        reason,
        detail,
    };

    match serde_json::to_string(&entry) {
        Ok(json) => {
            let stopping = *shared.shutdown.borrow();
            write_error_line(shared, settings, error_line(Utc::now(), &json), stopping).await;
        }
        Err(err) => warn!(error = %err, "Could not encode exhaustion entry"),
    }
}

async fn write_error_line(
    shared: &Shared,
    settings: &SinkSettings,
    line: String,
    non_blocking: bool,
) {
    let sink = shared.sink.clone();
    let settings = settings.clone();
    let result = tokio::task::spawn_blocking(move || {
        if non_blocking {
            sink.try_append_error_in(&settings, &line)
        } else {
            sink.append_error_in(&settings, &line).map(|()| true)
        }
    })
    .await;

    match result {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => debug!("Skipped contended error log write"),
        Ok(Err(err)) => warn!(error = %err, "Failed to write error log"),
        Err(err) => warn!(error = %err, "Error log writer task failed"),
    }
}
