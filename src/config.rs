use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BROKER_HOST: &str = "app.coreiot.io";
pub const DEFAULT_DEVICE_NAME: &str = "IOT_DEVICE_2";
pub const DEFAULT_LATITUDE: f64 = 10.795442523782544;
pub const DEFAULT_LONGITUDE: f64 = 106.678183991483;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: String,
    /// Device access token, sent as the MQTT password.
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub telemetry_interval_secs: u64,
    pub latitude: f64,
    pub longitude: f64,
}

fn env_required(key: &str) -> Result<String> {
    env_optional(key)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let device_name = env_or_default("DEVICE_NAME", DEFAULT_DEVICE_NAME.to_string());

        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_or_default("MQTT_BROKER_HOST", DEFAULT_BROKER_HOST.to_string()),
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                client_id: env_optional("MQTT_CLIENT_ID").unwrap_or_else(|| device_name.clone()),
                username: env_optional("MQTT_USERNAME").unwrap_or_else(|| device_name.clone()),
                access_token: env_required("MQTT_ACCESS_TOKEN")?,
            },
            device: DeviceConfig {
                name: device_name,
                telemetry_interval_secs: env_or_default("TELEMETRY_INTERVAL_SECS", 5),
                latitude: env_or_default("DEVICE_LATITUDE", DEFAULT_LATITUDE),
                longitude: env_or_default("DEVICE_LONGITUDE", DEFAULT_LONGITUDE),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mqtt.broker_host.is_empty() {
            return Err(Error::Config("MQTT_BROKER_HOST must not be empty".into()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(Error::Config("MQTT_CLIENT_ID must not be empty".into()));
        }
        if self.device.telemetry_interval_secs == 0 {
            return Err(Error::Config("TELEMETRY_INTERVAL_SECS must be > 0".into()));
        }
        if !(-90.0..=90.0).contains(&self.device.latitude) {
            return Err(Error::Config("DEVICE_LATITUDE must be within [-90, 90]".into()));
        }
        if !(-180.0..=180.0).contains(&self.device.longitude) {
            return Err(Error::Config("DEVICE_LONGITUDE must be within [-180, 180]".into()));
        }
        Ok(())
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.device.telemetry_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            mqtt: MqttConfig {
                broker_host: DEFAULT_BROKER_HOST.to_string(),
                broker_port: 1883,
                client_id: "DN-CLI-001".to_string(),
                username: "DN-CLI-001".to_string(),
                access_token: "token".to_string(),
            },
            device: DeviceConfig {
                name: "DN-CLI-001".to_string(),
                telemetry_interval_secs: 1,
                latitude: DEFAULT_LATITUDE,
                longitude: DEFAULT_LONGITUDE,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = sample_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.telemetry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = sample_config();
        config.device.telemetry_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TELEMETRY_INTERVAL_SECS"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = sample_config();
        config.mqtt.broker_host.clear();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut config = sample_config();
        config.device.latitude = 91.0;
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.device.longitude = -180.5;
        assert!(config.validate().is_err());
    }
}
