pub mod router;
pub mod rpc;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;

/// The two device flags controlled over RPC and attribute sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub door: bool,
    pub led: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            door: true,
            led: false,
        }
    }
}

/// Device state shared between the MQTT event loop and the telemetry loop.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<DeviceState>>);

impl SharedState {
    /// Lock the state. A poisoned lock still holds two valid booleans, so
    /// the guard is recovered instead of propagating the panic.
    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> DeviceState {
        *self.lock()
    }
}

/// Partial update for the `v1/devices/me/attributes` topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub door: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led: Option<bool>,
}

/// Body of the shared-attribute request sent after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct SharedKeysRequest {
    #[serde(rename = "sharedKeys")]
    pub shared_keys: &'static str,
}

pub const SYNCED_KEYS: SharedKeysRequest = SharedKeysRequest {
    shared_keys: "door,led",
};

/// Client-side attributes announced on every connect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Boolean coercion for JSON values: `null`, `false`, zero, `""`, `[]` and
/// `{}` are false, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn door_label(open: bool) -> &'static str {
    if open { "OPEN" } else { "CLOSED" }
}

pub fn led_label(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_state() {
        let state = DeviceState::default();
        assert!(state.door);
        assert!(!state.led);
    }

    #[test]
    fn test_truthy() {
        let falsy = [
            json!(null),
            json!(false),
            json!(0),
            json!(0.0),
            json!(""),
            json!([]),
            json!({}),
        ];
        for value in falsy {
            assert!(!truthy(&value), "{value} should be false");
        }
        let truthy_values = [
            json!(true),
            json!(1),
            json!(-2.5),
            json!("false"),
            json!([0]),
            json!({"a": 0}),
        ];
        for value in truthy_values {
            assert!(truthy(&value), "{value} should be true");
        }
    }

    #[test]
    fn test_attribute_update_skips_absent_fields() {
        let update = AttributeUpdate {
            door: Some(false),
            led: None,
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"door": false}));
    }

    #[test]
    fn test_request_and_info_bodies() {
        assert_eq!(
            serde_json::to_value(&SYNCED_KEYS).unwrap(),
            json!({"sharedKeys": "door,led"})
        );
        let info = DeviceInfo {
            device_name: "DN-CLI-001".to_string(),
            latitude: 10.5,
            longitude: 106.5,
        };
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"deviceName": "DN-CLI-001", "latitude": 10.5, "longitude": 106.5})
        );
    }

    #[test]
    fn test_shared_state_clones_share_data() {
        let state = SharedState::default();
        let other = state.clone();
        other.lock().led = true;
        assert!(state.snapshot().led);
    }
}
