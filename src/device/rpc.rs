use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{AttributeUpdate, SharedState, door_label, led_label, truthy};
use crate::error::Result;
use crate::mqtt::{Outbound, topics};

/// Server-side RPC methods understood by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcMethod {
    SetDoorValue,
    SetLedValue,
    GetDoorValue,
    GetLedValue,
    GetValue,
    Unknown(String),
}

impl RpcMethod {
    pub fn from_name(name: &str) -> Self {
        match name {
            "setDoorValue" => Self::SetDoorValue,
            "setLEDValue" => Self::SetLedValue,
            "getDoorValue" => Self::GetDoorValue,
            "getLEDValue" => Self::GetLedValue,
            "getValue" => Self::GetValue,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Payload of `v1/devices/me/rpc/request/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default, deserialize_with = "method_name")]
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Accept any JSON value as a method name; non-strings keep their JSON text
/// so they still reach the unknown-method response.
fn method_name<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => name,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcResult {
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub door: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RpcResponse {
    fn unknown_method(method: &str) -> Self {
        Self {
            result: Some(RpcResult::Error),
            message: Some(format!("Unknown method: {method}")),
            ..Self::default()
        }
    }
}

/// Apply one RPC request to the device state.
///
/// Returns the messages to publish, in order: the attribute update for
/// setters, then exactly one response on the topic correlated with
/// `request_id`.
pub fn handle(
    state: &SharedState,
    request: &RpcRequest,
    request_id: &str,
) -> Result<Vec<Outbound>> {
    let mut outbound = Vec::with_capacity(2);

    let response = match RpcMethod::from_name(&request.method) {
        RpcMethod::SetDoorValue => {
            let door = truthy(&request.params);
            state.lock().door = door;
            info!("Door set to {}", door_label(door));
            outbound.push(Outbound::json(
                topics::ATTRIBUTES,
                &AttributeUpdate {
                    door: Some(door),
                    led: None,
                },
            )?);
            RpcResponse {
                result: Some(RpcResult::Success),
                door: Some(door),
                ..RpcResponse::default()
            }
        }
        RpcMethod::SetLedValue => {
            let led = truthy(&request.params);
            state.lock().led = led;
            info!("LED set to {}", led_label(led));
            outbound.push(Outbound::json(
                topics::ATTRIBUTES,
                &AttributeUpdate {
                    door: None,
                    led: Some(led),
                },
            )?);
            RpcResponse {
                result: Some(RpcResult::Success),
                led: Some(led),
                ..RpcResponse::default()
            }
        }
        RpcMethod::GetDoorValue => RpcResponse {
            door: Some(state.snapshot().door),
            ..RpcResponse::default()
        },
        RpcMethod::GetLedValue => RpcResponse {
            led: Some(state.snapshot().led),
            ..RpcResponse::default()
        },
        RpcMethod::GetValue => {
            let current = state.snapshot();
            RpcResponse {
                door: Some(current.door),
                led: Some(current.led),
                ..RpcResponse::default()
            }
        }
        RpcMethod::Unknown(name) => {
            warn!("Unknown RPC method: {}", name);
            RpcResponse::unknown_method(&name)
        }
    };

    outbound.push(Outbound::json(topics::rpc_response(request_id), &response)?);
    Ok(outbound)
}
