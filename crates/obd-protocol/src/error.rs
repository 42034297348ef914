//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur during OBD-II communication
#[derive(Debug, Error)]
pub enum ObdError {
    /// No adapter found, or the adapter/vehicle handshake failed
    #[error("Failed to connect to OBD-II device: {0}")]
    Connection(String),

    /// The adapter answered a single query with an error
    #[error("Query failed: {0}")]
    Query(String),

    /// Timeout waiting for the adapter prompt
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// The transport to the adapter failed
    #[error("Serial port error: {0}")]
    Io(#[from] std::io::Error),

    /// The session is not (or no longer) connected
    #[error("OBD adapter not connected")]
    NotConnected,
}

impl ObdError {
    /// Whether this error means the adapter transport itself is gone,
    /// as opposed to a single query going wrong.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, ObdError::Io(_) | ObdError::NotConnected)
    }
}
