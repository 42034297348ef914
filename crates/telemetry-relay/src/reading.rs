//! One poll cycle's worth of sensor values

use obd_protocol::Pid;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Sensor magnitudes collected in one cycle
///
/// Only sensors that returned data are present. Serializes as a flat JSON
/// object keyed by sensor name, e.g. `{"RPM":850.0,"SPEED":0.0}`, in the
/// order the sensors were polled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    values: Vec<(Pid, f64)>,
}

impl Reading {
    /// Create an empty reading
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing any earlier value for the same sensor
    pub fn insert(&mut self, pid: Pid, value: f64) {
        match self.values.iter_mut().find(|(p, _)| *p == pid) {
            Some(slot) => slot.1 = value,
            None => self.values.push((pid, value)),
        }
    }

    /// Value recorded for a sensor
    pub fn get(&self, pid: Pid) -> Option<f64> {
        self.values.iter().find(|(p, _)| *p == pid).map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Sensors present in this reading
    pub fn sensors(&self) -> impl Iterator<Item = Pid> + '_ {
        self.values.iter().map(|(pid, _)| *pid)
    }

    /// Compact JSON text sent on the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (pid, value) in &self.values {
            map.serialize_entry(pid.name(), value)?;
        }
        map.end()
    }
}
