use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::mqtt::{Outbound, topics};

/// One reading published to `v1/devices/me/telemetry`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    pub longitude: f64,
    pub latitude: f64,
}

/// Simulated sensors. Values drift with the wall clock instead of an RNG:
/// each step adds `offset - (t mod period)` to a reading.
#[derive(Debug, Clone)]
pub struct SensorSimulation {
    current: TelemetrySample,
}

impl SensorSimulation {
    pub const INITIAL_TEMPERATURE: f64 = 30.0;
    pub const INITIAL_HUMIDITY: f64 = 50.0;
    pub const INITIAL_LIGHT: f64 = 100.0;

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            current: TelemetrySample {
                temperature: Self::INITIAL_TEMPERATURE,
                humidity: Self::INITIAL_HUMIDITY,
                light: Self::INITIAL_LIGHT,
                longitude,
                latitude,
            },
        }
    }

    pub fn from_config(device: &DeviceConfig) -> Self {
        Self::new(device.latitude, device.longitude)
    }

    pub fn sample(&self) -> TelemetrySample {
        self.current
    }

    /// Perturb the readings for Unix time `now` (fractional seconds).
    pub fn advance(&mut self, now: f64) {
        self.current.temperature += 0.5 - now % 1.0;
        self.current.humidity += 0.3 - now % 0.6;
        self.current.light += 1.0 - now % 2.0;
    }

    pub fn advance_now(&mut self) {
        self.advance(unix_time_secs());
    }

    /// Build the telemetry message for the current readings.
    pub fn outbound(&self) -> Result<Outbound> {
        Outbound::json(topics::TELEMETRY, &self.sample())
    }
}

pub fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_first_sample_is_seed() {
        let sim = SensorSimulation::new(10.0, 106.0);
        let out = sim.outbound().unwrap();
        assert_eq!(out.topic, "v1/devices/me/telemetry");
        assert_eq!(
            out.payload,
            json!({
                "temperature": 30.0,
                "humidity": 50.0,
                "light": 100.0,
                "longitude": 106.0,
                "latitude": 10.0,
            })
        );
    }

    #[test]
    fn test_advance_formula() {
        let mut sim = SensorSimulation::new(0.0, 0.0);
        // 1000.25: mod 1 = 0.25, mod 0.6 = 0.05, mod 2 = 0.25
        sim.advance(1000.25);
        let s = sim.sample();
        assert!((s.temperature - 30.25).abs() < EPSILON);
        assert!((s.humidity - 50.25).abs() < EPSILON);
        assert!((s.light - 100.75).abs() < EPSILON);

        // 1001.5: mod 1 = 0.5, mod 0.6 = 0.1, mod 2 = 1.5
        sim.advance(1001.5);
        let s = sim.sample();
        assert!((s.temperature - 30.25).abs() < EPSILON);
        assert!((s.humidity - 50.45).abs() < EPSILON);
        assert!((s.light - 100.25).abs() < EPSILON);
    }

    #[test]
    fn test_position_is_constant() {
        let mut sim = SensorSimulation::new(10.795442523782544, 106.678183991483);
        sim.advance(1234.567);
        sim.advance_now();
        let s = sim.sample();
        assert_eq!(s.latitude, 10.795442523782544);
        assert_eq!(s.longitude, 106.678183991483);
    }
}
