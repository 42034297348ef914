//! Relay Error Types

use obd_protocol::ObdError;
use thiserror::Error;

/// Errors that end the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// The OBD-II device could not be reached at startup
    #[error("Unable to connect to OBD-II device: {0}")]
    Device(#[from] ObdError),

    /// The device liveness check failed mid-run
    #[error("Lost connection to OBD-II device")]
    LinkLost,

    /// The WebSocket handshake with the collector failed
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// Sending a reading to the collector failed
    #[error("Send failed: {0}")]
    Send(String),

    /// A reading could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
