//! `chathook purge`, `chathook check-config` and `chathook init`.

use chathook_config_and_utils::RelayConfig;
use rotating_log_sink::{LogSink, PurgeService, PurgeTarget};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use webhook_retriable_worker::sink_settings;

pub fn purge(config: &RelayConfig, target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let target = PurgeTarget::parse(target).ok_or("purge target must be a source key or 'all'")?;
    let sink = Arc::new(LogSink::new(sink_settings(config))?);

    let report = PurgeService::new(sink).purge(&target)?;
    info!(?target, "Purge finished");
    println!("{report}");
    Ok(())
}

pub fn check_config(
    config_path: &Path,
    config: &RelayConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Configuration OK: {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

pub fn init_config(
    path: &Path,
    endpoint: &str,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    RelayConfig::new(endpoint).save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
