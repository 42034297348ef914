//! OBD-II Telemetry Relay - Main Entry Point

use anyhow::Context;
use obd_protocol::ObdClient;
use telemetry_relay::{init_logging, run_relay, RelayConfig, WebSocketSink};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== OBD-II Telemetry Relay v{} ===", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::load().context("failed to load configuration")?;

    run_relay(
        &config,
        |device| async move { ObdClient::connect(&device).await },
        |uri| async move { WebSocketSink::connect(&uri).await },
        interrupted(),
    )
    .await?;

    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
}
