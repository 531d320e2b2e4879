//! Watchtower CLI
//!
//! Command-line interface for the integration monitoring and notification
//! service.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use watchtower::{load_config, Config};

#[derive(Parser)]
#[command(name = "watchtower")]
#[command(about = "Integration health monitoring for AI Pradavan client accounts")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets();

    tracing::info!("Starting watchtower service");
    tracing::debug!(
        "Clients: {}, quick check: {} min, full report: {} min",
        config.clients.len(),
        config.schedule.quick_check_interval_minutes,
        config.schedule.report_interval_minutes
    );

    watchtower::run(config).await?;

    Ok(())
}
