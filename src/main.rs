//! CLI entrypoint (§6). Exit codes: 0 clean shutdown, 1 startup failure,
//! 130 signal-initiated stop.

use clap::Parser;
use dexwatch_core::config;
use dexwatch_core::scheduler::{wait_for_shutdown_signal, Scheduler};
use dexwatch_core::services::Services;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dexwatch", about = "on-chain DEX market-data collection engine")]
struct Cli {
    /// Path to the TOML configuration document.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Create/upgrade the schema, then exit unless --seed is also given.
    #[arg(long)]
    migrate: bool,

    /// Upsert tokens and DEXes from configuration, then exit.
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let app_config = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return 1;
        }
    };

    if cli.migrate {
        if let Err(e) = Services::migrate(&app_config.database.connection_url()).await {
            error!(error = %e, "migration failed");
            return 1;
        }
        info!("migration complete");
        if !cli.seed {
            return 0;
        }
    }

    let services = match Services::build(app_config).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "startup failed");
            return 1;
        }
    };

    if cli.seed {
        if let Err(e) = services.seed().await {
            error!(error = %e, "seed failed");
            return 1;
        }
        info!("seed complete");
        return 0;
    }

    let scheduler_cfg = &services.config.scheduler;
    let scheduler = Scheduler::start(
        services.collector.clone(),
        Duration::from_secs(scheduler_cfg.collect_interval_s),
        Duration::from_secs(scheduler_cfg.depth_interval_s),
        Duration::from_secs(scheduler_cfg.gas_interval_s),
        Duration::from_secs(scheduler_cfg.cleanup_interval_h * 3600),
        scheduler_cfg.retention_days,
    );

    info!("dexwatch running");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");
    scheduler.stop().await;
    130
}
