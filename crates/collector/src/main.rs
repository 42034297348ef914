//! Telemetry Collector - Main Entry Point

use collector::{init_logging, run_server, CollectorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== Telemetry Collector v{} ===", env!("CARGO_PKG_VERSION"));

    let config = CollectorConfig::load()?;
    run_server(config).await?;

    Ok(())
}
