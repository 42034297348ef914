//! Collector configuration

use config::{Environment, File};
use serde::{Deserialize, Serialize};

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Listen address (default: 0.0.0.0:8000)
    pub bind_addr: String,
    /// Messages buffered per client before it starts skipping
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            channel_capacity: 256,
        }
    }
}

impl CollectorConfig {
    /// Load from optional `collector.toml` and `COLLECTOR_` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(File::with_name("collector").required(false))
            .add_source(Environment::with_prefix("COLLECTOR"))
            .build()?
            .try_deserialize()
    }
}
