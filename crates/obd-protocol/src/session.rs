//! Device session abstraction

use crate::error::ObdError;
use crate::pid::Pid;

/// A live connection to a diagnostics interface that can be polled for
/// sensor values.
#[allow(async_fn_in_trait)]
pub trait DeviceSession {
    /// Last known transport state. Never performs I/O.
    fn is_connected(&self) -> bool;

    /// Issue one request for `pid`.
    ///
    /// `Ok(None)` means the vehicle answered but had no value for this PID.
    async fn query(&mut self, pid: Pid) -> Result<Option<f64>, ObdError>;

    /// Release the interface. Best effort, never fails.
    async fn disconnect(&mut self);
}
