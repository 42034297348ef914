//! OBD-II Protocol Implementation
//!
//! This crate provides an async session with ELM327-compatible OBD-II
//! adapters over a serial (or Bluetooth RFCOMM) port. The session is
//! exposed through the [`DeviceSession`] trait so callers can poll sensors
//! without caring about the adapter's command set.

mod client;
mod error;
mod pid;
mod protocol;
mod response;
mod session;

pub use client::{DeviceConfig, ObdClient, SessionState, DEFAULT_PORT};
pub use error::ObdError;
pub use pid::Pid;
pub use protocol::ObdProtocol;
pub use session::DeviceSession;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Added to the request mode in a positive response (`01` -> `41`)
    pub const RESPONSE_OFFSET: u8 = 0x40;
    /// Mode 01 PID listing supported PIDs 01-20, requested to confirm the vehicle answers
    pub const SUPPORTED_PIDS_01_20: u8 = 0x00;
}
