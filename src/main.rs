//! Collector Bridge
//!
//! Starts the local control surface, launches the collector with
//! `SCRAPER_ADDRESS` pointing at it and exits with the collector's status.
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!                 │              COLLECTOR BRIDGE            │
//!  collector ◀────┼── /server_request ◀── handoff ◀── socket ┼──── primary server
//!   process  ─────┼─▶ /server_response ─▶ router ───▶ socket ┼──── alternative servers
//!            ─────┼─▶ /send_cv ─▶ cache ─▶ fan-out (HTTP) ───┼────
//!                 └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use collector_bridge::config::load_config_or_env;
use collector_bridge::lifecycle::collector::{exit_code, Collector};
use collector_bridge::lifecycle::signals::wait_for_signal;
use collector_bridge::observability::{logging::init_logging, metrics::init_metrics};
use collector_bridge::Bridge;

#[derive(Parser)]
#[command(name = "collector-bridge")]
#[command(about = "Relay between a collector process and RT-CV matching servers", long_about = None)]
struct Cli {
    /// Configuration file, overridden by COLLECTOR_BRIDGE_CONFIG
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Serve a liveness endpoint on 0.0.0.0:<port>
    #[arg(long)]
    health_port: Option<u16>,

    /// Collector command line
    #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config_or_env(&cli.config)?;
    if let Some(port) = cli.health_port {
        config.health_check.port = Some(port);
    }

    init_logging(&config.observability);
    tracing::info!("collector-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bridge = Bridge::prepare(config).await?;
    let running = bridge.start().await?;

    let mut collector = Collector::spawn(&cli.command, running.address())?;

    let status = tokio::select! {
        status = collector.wait() => Some(status?),
        _ = wait_for_signal() => None,
    };

    let status = match status {
        Some(status) => {
            tracing::info!(%status, "Collector exited");
            status
        }
        None => {
            tracing::info!("Signal received, stopping collector");
            collector.stop().await?
        }
    };

    running.shutdown().await;
    tracing::info!("Shutdown complete");

    std::process::exit(exit_code(status));
}
