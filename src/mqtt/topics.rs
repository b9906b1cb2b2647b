//! ThingsBoard device API topics.

pub const RPC_REQUEST_PREFIX: &str = "v1/devices/me/rpc/request/";
pub const RPC_RESPONSE_PREFIX: &str = "v1/devices/me/rpc/response/";
pub const ATTRIBUTES: &str = "v1/devices/me/attributes";
pub const ATTRIBUTES_REQUEST_PREFIX: &str = "v1/devices/me/attributes/request/";
pub const ATTRIBUTES_RESPONSE_PREFIX: &str = "v1/devices/me/attributes/response/";
pub const TELEMETRY: &str = "v1/devices/me/telemetry";

pub const RPC_REQUEST_FILTER: &str = "v1/devices/me/rpc/request/+";
pub const ATTRIBUTES_RESPONSE_FILTER: &str = "v1/devices/me/attributes/response/+";

/// Filters subscribed to after every ConnAck.
pub const SUBSCRIPTIONS: [&str; 2] = [RPC_REQUEST_FILTER, ATTRIBUTES_RESPONSE_FILTER];

/// What an inbound topic means to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// RPC request carrying its correlation id (the last topic segment).
    RpcRequest(&'a str),
    /// Attribute push or response to an attribute request.
    Attributes,
    Other,
}

/// Classify an inbound topic.
///
/// Only the exact attributes topic and its `response/<id>` children count as
/// state sync; any other topic that merely mentions "attributes" is ignored.
pub fn classify(topic: &str) -> Route<'_> {
    if let Some(request_id) = topic.strip_prefix(RPC_REQUEST_PREFIX) {
        if !request_id.is_empty() && !request_id.contains('/') {
            return Route::RpcRequest(request_id);
        }
        return Route::Other;
    }
    if topic == ATTRIBUTES {
        return Route::Attributes;
    }
    match topic.strip_prefix(ATTRIBUTES_RESPONSE_PREFIX) {
        Some(id) if !id.is_empty() && !id.contains('/') => Route::Attributes,
        _ => Route::Other,
    }
}

pub fn rpc_response(request_id: &str) -> String {
    format!("{RPC_RESPONSE_PREFIX}{request_id}")
}

pub fn attributes_request(request_id: u64) -> String {
    format!("{ATTRIBUTES_REQUEST_PREFIX}{request_id}")
}
