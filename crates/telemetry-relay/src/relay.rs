//! Telemetry poll loop

use crate::error::RelayError;
use crate::reading::Reading;
use crate::settings::RelayConfig;
use crate::sink::TelemetrySink;
use obd_protocol::{DeviceSession, Pid};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polls a device session and forwards non-empty readings to a sink
#[derive(Debug, Clone)]
pub struct TelemetryLoop {
    /// Sensors queried each cycle, in order
    sensors: Vec<Pid>,
    /// Pause after each cycle
    interval: Duration,
}

impl TelemetryLoop {
    /// Create a loop over `sensors` with a fixed pause between cycles
    pub fn new(sensors: Vec<Pid>, interval: Duration) -> Self {
        Self { sensors, interval }
    }

    /// Create a loop over the configured sensors and interval
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.sensors.clone(), config.poll_interval())
    }

    /// Run one cycle: check liveness, query every sensor, send if anything
    /// answered.
    ///
    /// Returns the reading that was sent, `None` when no sensor had data,
    /// and [`RelayError::LinkLost`] without querying when the session is
    /// no longer connected.
    pub async fn poll_once<S, K>(
        &self,
        session: &mut S,
        sink: &mut K,
    ) -> Result<Option<Reading>, RelayError>
    where
        S: DeviceSession,
        K: TelemetrySink,
    {
        if !session.is_connected() {
            return Err(RelayError::LinkLost);
        }

        let mut reading = Reading::new();
        for &pid in &self.sensors {
            match session.query(pid).await {
                Ok(Some(value)) => reading.insert(pid, value),
                Ok(None) => debug!("{} returned no data", pid),
                Err(e) => warn!("{} query failed: {}", pid, e),
            }
        }

        if reading.is_empty() {
            debug!("No sensor data this cycle");
            return Ok(None);
        }

        let message = reading.to_json()?;
        sink.send(message.clone()).await?;
        info!("Sent: {}", message);
        Ok(Some(reading))
    }

    /// Poll until the device is lost (`Ok`) or a send fails (`Err`)
    ///
    /// The pause is not shortened by the time a cycle takes.
    pub async fn run<S, K>(&self, session: &mut S, sink: &mut K) -> Result<(), RelayError>
    where
        S: DeviceSession,
        K: TelemetrySink,
    {
        info!(
            sensors = ?self.sensors,
            interval_ms = self.interval.as_millis() as u64,
            "Starting telemetry loop"
        );

        loop {
            match self.poll_once(session, sink).await {
                Ok(_) => {}
                Err(RelayError::LinkLost) => {
                    warn!("Lost connection to OBD-II device.");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
