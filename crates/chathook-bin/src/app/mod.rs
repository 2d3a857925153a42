//! Subcommand implementations.

mod admin;
mod relay;
mod send;

pub use admin::{check_config, init_config, purge};
pub use relay::run_relay;
pub use send::send_one;

use chathook_config_and_utils::RelayConfig;
use rotating_log_sink::LogSink;
use std::sync::Arc;
use tokio::runtime::Handle;
use webhook_delivery_client::DeliveryClient;
use webhook_retriable_worker::{sink_settings, DeliveryScheduler, SchedulerResult};

/// Wire a scheduler to a fresh sink and the HTTP client.
fn build_scheduler(config: RelayConfig) -> SchedulerResult<DeliveryScheduler> {
    let sink = Arc::new(LogSink::new(sink_settings(&config))?);
    DeliveryScheduler::new(
        config,
        sink,
        Arc::new(DeliveryClient::default()),
        Handle::current(),
    )
}
