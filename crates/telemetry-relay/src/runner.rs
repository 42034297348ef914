//! Relay lifecycle
//!
//! Connects the device first and the collector second, so a missing
//! adapter never causes network traffic. Both handles are released on
//! every exit path, including shutdown.

use crate::error::RelayError;
use crate::relay::TelemetryLoop;
use crate::settings::RelayConfig;
use crate::sink::TelemetrySink;
use obd_protocol::{DeviceConfig, DeviceSession, ObdError};
use std::future::Future;
use tracing::{info, warn};

/// Connect, poll until the device is lost, a send fails or `shutdown`
/// resolves, then release the sink and the session.
///
/// Device loss and shutdown are clean exits. Connect and send failures are
/// returned after both handles have been released.
pub async fn run_relay<S, K, D, DF, C, CF, X>(
    config: &RelayConfig,
    connect_device: D,
    connect_sink: C,
    shutdown: X,
) -> Result<(), RelayError>
where
    S: DeviceSession,
    K: TelemetrySink,
    D: FnOnce(DeviceConfig) -> DF,
    DF: Future<Output = Result<S, ObdError>>,
    C: FnOnce(String) -> CF,
    CF: Future<Output = Result<K, RelayError>>,
    X: Future<Output = ()>,
{
    let mut session = connect_device(config.device.clone()).await?;

    let mut sink = match connect_sink(config.server_uri.clone()).await {
        Ok(sink) => sink,
        Err(e) => {
            warn!("Collector unreachable, releasing device");
            session.disconnect().await;
            return Err(e);
        }
    };

    let telemetry = TelemetryLoop::from_config(config);
    let outcome = tokio::select! {
        result = telemetry.run(&mut session, &mut sink) => result,
        _ = shutdown => {
            info!("Exiting program.");
            Ok(())
        }
    };

    sink.close().await;
    session.disconnect().await;
    outcome
}
