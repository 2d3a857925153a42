//! `chathook send`: deliver one message and wait for its outcome.

use super::build_scheduler;
use chat_event_record::EventRecord;
use chathook_config_and_utils::RelayConfig;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use webhook_retriable_worker::DeliveryState;

pub async fn send_one(
    config: RelayConfig,
    player: String,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config)?;
    let mut reports = scheduler.subscribe();

    let record = EventRecord::chat_message(player, message, Utc::now());
    let id = record.id();
    let key_log = scheduler.sink().key_log_path(record.source_key());
    if !scheduler.submit(record).is_accepted() {
        return Err("relay refused the event".into());
    }

    let report = loop {
        tokio::select! {
            received = reports.recv() => match received {
                Ok(report) if report.record_id == id => break Some(report),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break None,
            },
            _ = tokio::signal::ctrl_c() => break None,
        }
    };

    scheduler.shutdown(Duration::ZERO).await;

    let Some(report) = report else {
        return Err("interrupted before the delivery finished".into());
    };

    info!(%id, state = %report.state, attempts = report.attempts, "Send finished");
    println!(
        "{} {} after {} attempt(s); log: {}",
        report.record_id,
        report.state,
        report.attempts,
        key_log.display()
    );

    if report.state != DeliveryState::Succeeded {
        return Err(format!("delivery {}", report.state).into());
    }
    Ok(())
}
