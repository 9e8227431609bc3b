use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use gavel_server::ServerConfig;
use gavel_telemetry::TelemetryConfig;

/// Real-time auction event distribution service.
#[derive(Parser, Debug)]
#[command(name = "gavel", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Seconds between liveness sweeps over the connection registry.
    #[arg(long, default_value_t = 30)]
    sweep_interval_secs: u64,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    gavel_telemetry::init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        json: cli.log_json,
    });

    let config = ServerConfig {
        port: cli.port,
        sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
        ..Default::default()
    };
    let handle = gavel_server::start(config)
        .await
        .context("failed to start the auction event service")?;

    tracing::info!(port = handle.port, "Gavel ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown();
    Ok(())
}
