//! Chathook - relays chat events to a webhook with retries and per-sender delivery logs.

mod app;
mod input;

use std::path::PathBuf;
use std::time::Duration;

use chathook_config_and_utils::{init_logging, Paths, RelayConfig};
use clap::{Parser, Subcommand};

/// Chathook command-line interface.
#[derive(Parser)]
#[command(name = "chathook")]
#[command(about = "Relay chat events to a webhook with retries and delivery logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config's log_level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.chathook
    #[arg(long, global = true, env = "CHATHOOK_HOME")]
    base_dir: Option<PathBuf>,

    /// Config file. Defaults to <base-dir>/config.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay newline-delimited JSON events read from stdin
    Run {
        /// How long running deliveries may take to finish on shutdown
        #[arg(long, default_value_t = 5_000)]
        grace_ms: u64,
    },
    /// Deliver a single chat message and report its outcome
    Send {
        #[arg(long)]
        player: String,
        #[arg(long)]
        message: String,
    },
    /// Delete one sender's delivery log, or every log with "all"
    Purge {
        /// Source key, or "all"
        target: String,
    },
    /// Validate the configuration and print it
    CheckConfig,
    /// Write a starter config pointing at a webhook endpoint
    Init {
        #[arg(long)]
        endpoint: String,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let load = || match &cli.config {
        Some(path) => RelayConfig::load_from_file(path),
        None => RelayConfig::load(&paths),
    };
    let level = |config: &RelayConfig| {
        cli.log_level
            .clone()
            .unwrap_or_else(|| config.log_level.clone())
    };

    match &cli.command {
        Commands::Init { endpoint, force } => {
            app::init_config(&config_path, endpoint, *force)?;
        }
        Commands::Run { grace_ms } => {
            let config = load()?;
            init_logging(&level(&config), Some(paths.trace_file()));
            app::run_relay(config, &config_path, Duration::from_millis(*grace_ms)).await?;
        }
        Commands::Send { player, message } => {
            let config = load()?;
            init_logging(&level(&config), None);
            app::send_one(config, player.clone(), message.clone()).await?;
        }
        Commands::Purge { target } => {
            let config = load()?;
            init_logging(&level(&config), None);
            app::purge(&config, target)?;
        }
        Commands::CheckConfig => {
            app::check_config(&config_path, &load()?)?;
        }
    }

    Ok(())
}
