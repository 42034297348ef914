//! Relay configuration
//!
//! Defaults reproduce the fixed behavior of the relay: poll RPM, speed and
//! coolant temperature once a second from the default adapter port and send
//! them to `ws://ws.sonny.ro`. An optional TOML file and `RELAY_`-prefixed
//! environment variables may override them.

use crate::error::RelayError;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use obd_protocol::{DeviceConfig, Pid};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Collector the relay sends to
pub const DEFAULT_SERVER_URI: &str = "ws://ws.sonny.ro";

/// File read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "telemetry-relay.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "TELEMETRY_RELAY_CONFIG";

/// Prefix of environment overrides, e.g. `RELAY_SERVER_URI`, `RELAY_DEVICE__PORT`
const ENV_PREFIX: &str = "RELAY";

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URI of the collector (default: ws://ws.sonny.ro)
    pub server_uri: String,
    /// Pause between poll cycles in milliseconds (default: 1000)
    pub poll_interval_ms: u64,
    /// Sensors queried each cycle, in order
    pub sensors: Vec<Pid>,
    /// Adapter connection settings
    pub device: DeviceConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_uri: DEFAULT_SERVER_URI.to_string(),
            poll_interval_ms: 1000,
            sensors: Pid::ALL.to_vec(),
            device: DeviceConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load from the optional config file and the environment
    pub fn load() -> Result<Self, RelayError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::from_builder(
            config::Config::builder()
                .add_source(File::from(path.as_path()).required(false))
                .add_source(env_overrides()),
        )
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, RelayError> {
        Self::from_builder(config::Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, RelayError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<(), RelayError> {
        if !(self.server_uri.starts_with("ws://") || self.server_uri.starts_with("wss://")) {
            return Err(RelayError::InvalidConfig(format!(
                "server_uri must be a ws:// or wss:// URI, got {:?}",
                self.server_uri
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.sensors.is_empty() {
            return Err(RelayError::InvalidConfig("no sensors configured".to_string()));
        }
        Ok(())
    }

    /// Pause between poll cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `RELAY_` + key, nested keys joined with `__`
fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
