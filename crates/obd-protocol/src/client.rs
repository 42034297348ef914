//! OBD-II Client for ELM327 Adapters
//!
//! Provides an async session with an OBD-II adapter over any byte transport.
//! Production code opens a serial port; tests drive the same client over an
//! in-memory duplex pipe.

use crate::error::ObdError;
use crate::pid::Pid;
use crate::protocol::ObdProtocol;
use crate::response::{self, PROMPT};
use crate::session::DeviceSession;
use crate::mode;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Port tried when none is configured
#[cfg(unix)]
pub const DEFAULT_PORT: &str = "/dev/rfcomm0";
/// Port tried when none is configured
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM3";

/// Default timeout for OBD commands
const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default ELM327 baud rate
const DEFAULT_BAUD_RATE: u32 = 38400;

/// Adapter settings applied after reset: echo, linefeeds, spaces, headers off
const SETUP_COMMANDS: [&str; 4] = ["ATE0", "ATL0", "ATS0", "ATH0"];

/// Configuration for the adapter connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port path; [`DEFAULT_PORT`] when unset
    pub port: Option<String>,
    /// Serial baud rate (default: 38400)
    pub baud_rate: u32,
    /// Vehicle protocol requested from the adapter
    pub protocol: ObdProtocol,
    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: ObdProtocol::Auto,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl DeviceConfig {
    /// Port that will be opened
    pub fn port(&self) -> &str {
        self.port.as_deref().unwrap_or(DEFAULT_PORT)
    }

    /// Per-command timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Liveness of an adapter session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet connected, or released
    Disconnected,
    /// Handshake completed and the transport is healthy
    Connected,
    /// The transport failed after connecting
    Lost,
}

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient<T> {
    /// Byte transport to the adapter
    transport: T,
    /// Device path, for logging
    device: String,
    /// OBD protocol requested at connect time
    protocol: ObdProtocol,
    /// Command timeout
    timeout: Duration,
    /// Session liveness
    state: SessionState,
    /// Identification string reported on reset (e.g. "ELM327 v1.5")
    adapter: Option<String>,
    /// A command timed out; its reply may still arrive and must be
    /// discarded before the next command
    resync: bool,
}

impl ObdClient<SerialStream> {
    /// Open the configured (or default) serial port and run the adapter
    /// handshake. Exactly one port is tried.
    pub async fn connect(config: &DeviceConfig) -> Result<Self, ObdError> {
        let port = config.port();
        info!("Connecting to OBD-II adapter on {} at {} baud", port, config.baud_rate);

        let stream = tokio_serial::new(port, config.baud_rate)
            .timeout(config.timeout())
            .open_native_async()
            .map_err(|e| ObdError::Connection(format!("{port}: {e}")))?;

        Self::handshake(stream, port, config).await
    }
}

impl<T> ObdClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Initialize an adapter reachable over `transport`
    ///
    /// Any failure during the handshake is reported as
    /// [`ObdError::Connection`].
    pub async fn handshake(
        transport: T,
        device: impl Into<String>,
        config: &DeviceConfig,
    ) -> Result<Self, ObdError> {
        let mut client = Self {
            transport,
            device: device.into(),
            protocol: config.protocol,
            timeout: config.timeout(),
            state: SessionState::Disconnected,
            adapter: None,
            resync: false,
        };

        client.initialize().await.map_err(|e| match e {
            ObdError::Connection(_) => e,
            other => ObdError::Connection(other.to_string()),
        })?;

        Ok(client)
    }

    /// Reset the adapter, configure it and check that the vehicle answers
    async fn initialize(&mut self) -> Result<(), ObdError> {
        info!("Initializing OBD adapter on {}", self.device);

        let reset = self.command("ATZ").await?;
        self.adapter = response::lines(&reset)
            .find(|line| !line.eq_ignore_ascii_case("ATZ"))
            .map(str::to_string);

        for cmd in SETUP_COMMANDS {
            self.expect_ok(cmd).await?;
        }
        let select = self.protocol.to_elm_command();
        self.expect_ok(&select).await?;

        // The vehicle must answer "supported PIDs" before we report connected
        let request = format!("{:02X}{:02X}", mode::CURRENT_DATA, mode::SUPPORTED_PIDS_01_20);
        let raw = self.command(&request).await?;
        match response::parse_reply(&request, mode::SUPPORTED_PIDS_01_20, &raw) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                return Err(ObdError::Connection(format!(
                    "vehicle did not answer {request}: {:?}",
                    raw.trim_end_matches(PROMPT as char).trim()
                )));
            }
        }

        self.state = SessionState::Connected;
        info!(
            adapter = self.adapter.as_deref().unwrap_or("unknown"),
            protocol = ?self.protocol,
            "Connected to OBD-II device!"
        );
        Ok(())
    }

    async fn expect_ok(&mut self, cmd: &str) -> Result<(), ObdError> {
        let raw = self.command(cmd).await?;
        if response::is_ok(&raw) {
            Ok(())
        } else {
            Err(ObdError::Connection(format!("adapter rejected {cmd}: {:?}", raw.trim())))
        }
    }

    /// Send one command and collect the reply up to the prompt
    async fn command(&mut self, cmd: &str) -> Result<String, ObdError> {
        if self.resync {
            self.discard_stale().await?;
        }

        debug!(device = %self.device, "-> {}", cmd);

        let line = format!("{cmd}\r");
        let written = self.transport.write_all(line.as_bytes()).await;
        if let Err(e) = written {
            return Err(self.lose(e));
        }

        let mut raw = Vec::new();
        let outcome =
            tokio::time::timeout(self.timeout, read_until_prompt(&mut self.transport, &mut raw)).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.lose(e)),
            Err(_) => {
                self.resync = true;
                return Err(ObdError::Timeout(self.timeout.as_millis() as u64));
            }
        }

        let reply = String::from_utf8_lossy(&raw).into_owned();
        debug!(device = %self.device, "<- {:?}", reply);
        Ok(reply)
    }

    /// Drop the late reply to a timed-out command
    ///
    /// Reads until a prompt arrives or the adapter stays quiet for one
    /// command timeout, whichever comes first.
    async fn discard_stale(&mut self) -> Result<(), ObdError> {
        self.resync = false;
        let mut stale = Vec::new();
        let outcome =
            tokio::time::timeout(self.timeout, read_until_prompt(&mut self.transport, &mut stale)).await;

        match outcome {
            Ok(Ok(())) => {
                debug!(device = %self.device, "Discarded late reply {:?}", String::from_utf8_lossy(&stale));
                Ok(())
            }
            Ok(Err(e)) => Err(self.lose(e)),
            Err(_) => {
                debug!(device = %self.device, "No late reply after timeout");
                Ok(())
            }
        }
    }

    /// Record a transport failure
    fn lose(&mut self, err: io::Error) -> ObdError {
        if self.state == SessionState::Connected {
            warn!("Lost connection to OBD adapter on {}: {}", self.device, err);
        }
        self.state = SessionState::Lost;
        ObdError::Io(err)
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get current protocol
    pub fn protocol(&self) -> ObdProtocol {
        self.protocol
    }

    /// Adapter identification captured during reset
    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }
}

/// Read adapter output into `raw` until the prompt arrives
async fn read_until_prompt<T>(transport: &mut T, raw: &mut Vec<u8>) -> io::Result<()>
where
    T: AsyncRead + Unpin,
{
    let mut buf = [0u8; 128];
    loop {
        let n = transport.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "adapter closed the connection",
            ));
        }
        raw.extend_from_slice(&buf[..n]);
        if raw.contains(&PROMPT) {
            return Ok(());
        }
    }
}

impl<T> DeviceSession for ObdClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    async fn query(&mut self, pid: Pid) -> Result<Option<f64>, ObdError> {
        if !self.is_connected() {
            return Err(ObdError::NotConnected);
        }

        let request = pid.request();
        let raw = self.command(&request).await?;
        let value = response::parse_reply(&request, pid.as_hex(), &raw)?
            .and_then(|bytes| pid.decode(&bytes));

        debug!("{} = {:?}", pid, value);
        Ok(value)
    }

    /// Errors closing the vehicle protocol are logged and ignored.
    async fn disconnect(&mut self) {
        if self.state == SessionState::Connected {
            info!("Disconnecting OBD client");
            if let Err(e) = self.command("ATPC").await {
                debug!("Protocol close failed: {}", e);
            }
        }
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    /// Spawn a fake adapter answering each CR-terminated command with
    /// `reply(cmd)`. A `None` reply hangs up.
    fn spawn_adapter<F>(reply: F) -> DuplexStream
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        spawn_slow_adapter(reply, |_| Duration::ZERO)
    }

    /// Like [`spawn_adapter`], waiting `delay(cmd)` before each reply
    fn spawn_slow_adapter<F, D>(reply: F, delay: D) -> DuplexStream
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
        D: Fn(&str) -> Duration + Send + 'static,
    {
        let (client, mut adapter) = duplex(1024);
        tokio::spawn(async move {
            let mut pending = Vec::new();
            let mut buf = [0u8; 64];
            loop {
                let n = match adapter.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&buf[..n]);
                while let Some(end) = pending.iter().position(|&b| b == b'\r') {
                    let cmd: Vec<u8> = pending.drain(..=end).collect();
                    let cmd = String::from_utf8_lossy(&cmd[..cmd.len() - 1]).into_owned();
                    let pause = delay(&cmd);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    match reply(&cmd) {
                        Some(text) => {
                            let framed = format!("{text}\r\r>");
                            if adapter.write_all(framed.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
        });
        client
    }

    fn elm327(cmd: &str) -> Option<String> {
        let reply = match cmd {
            "ATZ" => "\r\rELM327 v1.5",
            c if c.starts_with("AT") => "OK",
            "0100" => "SEARCHING...\r4100BE3EB811",
            "010C" => "410C0D48",
            "010D" => "410D00",
            "0105" => "NO DATA",
            _ => "?",
        };
        Some(reply.to_string())
    }

    #[tokio::test]
    async fn test_handshake_connects() {
        let transport = spawn_adapter(elm327);
        let client = ObdClient::handshake(transport, "mock", &DeviceConfig::default())
            .await
            .unwrap();
        assert!(client.is_connected());
        assert_eq!(client.state(), SessionState::Connected);
        assert_eq!(client.adapter(), Some("ELM327 v1.5"));
        assert_eq!(client.protocol(), ObdProtocol::Auto);
    }

    #[tokio::test]
    async fn test_query_values_and_no_data() {
        let transport = spawn_adapter(elm327);
        let mut client = ObdClient::handshake(transport, "mock", &DeviceConfig::default())
            .await
            .unwrap();

        assert_eq!(client.query(Pid::Rpm).await.unwrap(), Some(850.0));
        assert_eq!(client.query(Pid::Speed).await.unwrap(), Some(0.0));
        assert_eq!(client.query(Pid::CoolantTemp).await.unwrap(), None);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_adapter_error_keeps_session() {
        let transport = spawn_adapter(|cmd| match cmd {
            "010C" => Some("CAN ERROR".to_string()),
            other => elm327(other),
        });
        let mut client = ObdClient::handshake(transport, "mock", &DeviceConfig::default())
            .await
            .unwrap();

        let err = client.query(Pid::Rpm).await.unwrap_err();
        assert!(matches!(err, ObdError::Query(_)));
        assert!(!err.is_transport_fault());
        assert!(client.is_connected());
        assert_eq!(client.query(Pid::Speed).await.unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn test_hangup_marks_session_lost() {
        let transport = spawn_adapter(|cmd| match cmd {
            "010C" => None,
            other => elm327(other),
        });
        let mut client = ObdClient::handshake(transport, "mock", &DeviceConfig::default())
            .await
            .unwrap();

        let err = client.query(Pid::Rpm).await.unwrap_err();
        assert!(err.is_transport_fault());
        assert_eq!(client.state(), SessionState::Lost);
        assert!(!client.is_connected());
        assert!(matches!(
            client.query(Pid::Speed).await,
            Err(ObdError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_vehicle_silent_fails_connect() {
        let transport = spawn_adapter(|cmd| match cmd {
            "0100" => Some("UNABLE TO CONNECT".to_string()),
            other => elm327(other),
        });
        let result = ObdClient::handshake(transport, "mock", &DeviceConfig::default()).await;
        assert!(matches!(result, Err(ObdError::Connection(_))));
    }

    #[tokio::test]
    async fn test_adapter_absent_fails_connect() {
        let transport = spawn_adapter(|_| None);
        let result = ObdClient::handshake(transport, "mock", &DeviceConfig::default()).await;
        assert!(matches!(result, Err(ObdError::Connection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_adapter_times_out() {
        let (transport, _adapter) = duplex(1024);
        let config = DeviceConfig {
            timeout_ms: 500,
            ..DeviceConfig::default()
        };
        let result = ObdClient::handshake(transport, "mock", &config).await;
        match result {
            Err(ObdError::Connection(msg)) => assert!(msg.contains("500ms")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("handshake should time out"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_not_taken_for_next_answer() {
        let transport = spawn_slow_adapter(
            |cmd| match cmd {
                "010D" => Some("410D32".to_string()),
                other => elm327(other),
            },
            |cmd| {
                if cmd == "010C" {
                    Duration::from_millis(300)
                } else {
                    Duration::ZERO
                }
            },
        );
        let config = DeviceConfig {
            timeout_ms: 200,
            ..DeviceConfig::default()
        };
        let mut client = ObdClient::handshake(transport, "mock", &config).await.unwrap();

        assert!(matches!(client.query(Pid::Rpm).await, Err(ObdError::Timeout(200))));
        assert!(client.is_connected());
        assert_eq!(client.query(Pid::Speed).await.unwrap(), Some(50.0));
        assert_eq!(client.query(Pid::Speed).await.unwrap(), Some(50.0));
    }

    #[tokio::test]
    async fn test_disconnect() {
        let transport = spawn_adapter(elm327);
        let mut client = ObdClient::handshake(transport, "mock", &DeviceConfig::default())
            .await
            .unwrap();
        client.disconnect().await;
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(matches!(
            client.query(Pid::Rpm).await,
            Err(ObdError::NotConnected)
        ));
    }

    #[test]
    fn test_device_config_default() {
        let config = DeviceConfig::default();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.baud_rate, 38400);
        assert_eq!(config.timeout(), Duration::from_millis(2000));
    }
}
