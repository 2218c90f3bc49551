mod config;
mod fleet;
mod telemetry;

use clap::Parser;
use config::{CliArgs, CliConfig};
use telemetry::init_telemetry;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let report = fleet::run(&config)?;

    info!(
        first_wave = ?report.first_wave,
        crashed = ?report.crashed,
        replacements = ?report.replacements,
        "fleet settled"
    );
    for (identity, id) in &report.ids {
        println!(
            "{} identity={} datacenter={} node={} sequence={} unix_ms={}",
            id.to_padded_string(),
            identity,
            id.datacenter_id(),
            id.node_id(),
            id.sequence(),
            id.unix_millis(config.epoch),
        );
    }

    Ok(())
}

fn log_startup_info(config: &CliConfig) {
    if cfg!(debug_assertions) {
        info!("Starting fleet simulation with full config: {:#?}", config);
    } else {
        info!(
            "Starting fleet simulation with {} processes under {}",
            config.processes,
            config.layout.root()
        );
    }
}
