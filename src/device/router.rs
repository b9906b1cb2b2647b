use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::rpc::{self, RpcRequest};
use super::{SharedState, door_label, led_label, truthy};
use crate::error::{Error, Result};
use crate::mqtt::Outbound;
use crate::mqtt::topics::{self, Route};

/// Dispatches inbound messages to the RPC handler or the attribute sync.
#[derive(Debug, Clone)]
pub struct Router {
    state: SharedState,
}

impl Router {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Handle one inbound message and return what should be published.
    ///
    /// Never fails: any error is logged here and the message is dropped.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Vec<Outbound> {
        info!("Received {}: {}", topic, String::from_utf8_lossy(payload));
        self.dispatch(topic, payload).unwrap_or_else(|e| {
            warn!("Dropping message: {}", e);
            Vec::new()
        })
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<Vec<Outbound>> {
        match topics::classify(topic) {
            Route::RpcRequest(request_id) => {
                // Object first: serde would otherwise accept `["name", params]`
                let object: Map<String, Value> = decode(topic, payload)?;
                let request: RpcRequest = serde_json::from_value(Value::Object(object))
                    .map_err(|source| Error::Decode {
                        topic: topic.to_string(),
                        source,
                    })?;
                debug!(
                    "RPC method={} params={} request_id={}",
                    request.method, request.params, request_id
                );
                rpc::handle(&self.state, &request, request_id)
            }
            Route::Attributes => {
                let attributes: Map<String, Value> = decode(topic, payload)?;
                self.sync_attributes(&attributes);
                Ok(Vec::new())
            }
            Route::Other => {
                debug!("No handler for topic {}", topic);
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the flags present in an attribute message.
    ///
    /// Pushes carry the keys at the top level; responses to an attribute
    /// request nest them under `shared`. Top-level keys win.
    fn sync_attributes(&self, attributes: &Map<String, Value>) {
        let shared = attributes.get("shared").and_then(Value::as_object);
        let lookup = |key: &str| {
            attributes
                .get(key)
                .or_else(|| shared.and_then(|s| s.get(key)))
        };

        let mut state = self.state.lock();
        if let Some(door) = lookup("door") {
            state.door = truthy(door);
            info!("Door state synced from server: {}", door_label(state.door));
        }
        if let Some(led) = lookup("led") {
            state.led = truthy(led);
            info!("LED state synced from server: {}", led_label(state.led));
        }
    }
}

fn decode<T: DeserializeOwned>(topic: &str, payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|source| Error::Decode {
        topic: topic.to_string(),
        source,
    })
}
