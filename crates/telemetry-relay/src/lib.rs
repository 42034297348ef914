//! OBD-II Telemetry Relay
//!
//! Polls a fixed set of OBD-II sensors once per interval and forwards each
//! non-empty reading as a JSON text frame over one WebSocket connection.
//! No buffering, no retries, no reconnection: losing the device ends the
//! loop, a failed send ends the process.

mod error;
mod reading;
mod relay;
mod runner;
mod settings;
mod sink;

#[cfg(test)]
mod testing;

pub use error::RelayError;
pub use reading::Reading;
pub use relay::TelemetryLoop;
pub use runner::run_relay;
pub use settings::{RelayConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, DEFAULT_SERVER_URI};
pub use sink::{TelemetrySink, WebSocketSink};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
