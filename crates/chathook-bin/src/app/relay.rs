//! `chathook run`: the long-running relay.

use super::build_scheduler;
use crate::input::parse_event_line;
use chathook_config_and_utils::RelayConfig;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Read events from stdin until EOF or Ctrl-C, then shut down gracefully.
///
/// SIGHUP reloads `config_path`; a bad file leaves the current config in force.
pub async fn run_relay(
    config: RelayConfig,
    config_path: &Path,
    grace: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config)?;

    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel::<()>();
    #[cfg(unix)]
    let signals = reload_signals::spawn(reload_tx)?;
    #[cfg(not(unix))]
    drop(reload_tx);

    info!(config = %config_path.display(), "Relay running, reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut accepted: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_event_line(&line, Utc::now()) {
                        Ok(record) => {
                            if scheduler.submit(record).is_accepted() {
                                accepted += 1;
                            }
                        }
                        Err(e) => {
                            skipped += 1;
                            warn!(error = %e, "Skipping malformed event line");
                        }
                    }
                }
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read stdin");
                    break;
                }
            },
            Some(()) = reload_rx.recv() => {
                if let Err(e) = scheduler.reload_from_file(config_path) {
                    warn!(error = %e, "Config reload failed, keeping current configuration");
                }
            }
            _ = &mut ctrl_c => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    let summary = scheduler.shutdown(grace).await;

    #[cfg(unix)]
    signals.close();

    info!(
        accepted,
        skipped,
        cancelled = summary.cancelled,
        still_running = summary.still_running,
        "Relay stopped"
    );
    Ok(())
}

#[cfg(unix)]
mod reload_signals {
    use signal_hook::consts::SIGHUP;
    use signal_hook::iterator::{Handle, Signals};
    use tokio::sync::mpsc;
    use tracing::info;

    /// Forward SIGHUP to `tx` from a dedicated thread until the handle is closed.
    pub fn spawn(tx: mpsc::UnboundedSender<()>) -> std::io::Result<Handle> {
        let mut signals = Signals::new([SIGHUP])?;
        let handle = signals.handle();

        std::thread::Builder::new()
            .name("chathook-sighup".into())
            .spawn(move || {
                for _ in signals.forever() {
                    info!("Received SIGHUP, reloading configuration");
                    if tx.send(()).is_err() {
                        break;
                    }
                }
            })?;

        Ok(handle)
    }
}
