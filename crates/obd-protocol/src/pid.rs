//! OBD-II PID Definitions and Decoding
//!
//! Defines the Mode 01 Parameter IDs polled by the relay, their wire names
//! and their decoding formulas.

use crate::mode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode 01 (current data) PIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Pid {
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
}

impl Pid {
    /// Every PID this crate knows how to decode, in polling order
    pub const ALL: [Pid; 3] = [Pid::Rpm, Pid::Speed, Pid::CoolantTemp];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Name used as the key in outbound telemetry
    pub fn name(&self) -> &'static str {
        match self {
            Pid::Rpm => "RPM",
            Pid::Speed => "SPEED",
            Pid::CoolantTemp => "COOLANT_TEMP",
        }
    }

    /// Get the number of data bytes in a response for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm => 2,
            Pid::Speed | Pid::CoolantTemp => 1,
        }
    }

    /// ELM327 request string, e.g. `010C`
    pub fn request(&self) -> String {
        format!("{:02X}{:02X}", mode::CURRENT_DATA, self.as_hex())
    }

    /// Decode the data bytes of a response
    ///
    /// Returns `None` when fewer bytes than [`Pid::response_bytes`] were
    /// supplied.
    pub fn decode(&self, bytes: &[u8]) -> Option<f64> {
        if bytes.len() < self.response_bytes() {
            return None;
        }
        let value = match self {
            // RPM: ((A*256)+B)/4
            Pid::Rpm => (bytes[0] as f64 * 256.0 + bytes[1] as f64) / 4.0,
            // Speed: A (km/h)
            Pid::Speed => bytes[0] as f64,
            // Coolant Temp: A - 40 (°C)
            Pid::CoolantTemp => bytes[0] as f64 - 40.0,
        };
        Some(value)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_decode() {
        // 1A 2B => ((0x1A * 256) + 0x2B) / 4 = (26*256 + 43) / 4 = 6699/4 = 1674.75
        let value = Pid::Rpm.decode(&[0x1A, 0x2B]).unwrap();
        assert!((value - 1674.75).abs() < 0.01);
    }

    #[test]
    fn test_idle_rpm_decode() {
        // 0D 48 => 3400 / 4 = 850
        assert_eq!(Pid::Rpm.decode(&[0x0D, 0x48]), Some(850.0));
    }

    #[test]
    fn test_coolant_temp_decode() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        let value = Pid::CoolantTemp.decode(&[0x73]).unwrap();
        assert!((value - 75.0).abs() < 0.01);

        // Minimum representable temperature
        assert_eq!(Pid::CoolantTemp.decode(&[0x00]), Some(-40.0));
    }

    #[test]
    fn test_speed_decode() {
        // 0x55 = 85 km/h
        assert_eq!(Pid::Speed.decode(&[0x55]), Some(85.0));
    }

    #[test]
    fn test_short_response_is_none() {
        assert_eq!(Pid::Rpm.decode(&[0x0D]), None);
        assert_eq!(Pid::Speed.decode(&[]), None);
    }

    #[test]
    fn test_request_and_names() {
        assert_eq!(Pid::Rpm.request(), "010C");
        assert_eq!(Pid::Speed.request(), "010D");
        assert_eq!(Pid::CoolantTemp.request(), "0105");
        assert_eq!(Pid::CoolantTemp.to_string(), "COOLANT_TEMP");
    }
}
