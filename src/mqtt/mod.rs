pub mod client;
pub mod topics;

use serde::Serialize;

use crate::error::{Error, Result};

/// A message the device wants published, always at QoS 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Outbound {
    pub fn json<T: Serialize>(topic: impl Into<String>, body: &T) -> Result<Self> {
        let topic = topic.into();
        match serde_json::to_value(body) {
            Ok(payload) => Ok(Self { topic, payload }),
            Err(source) => Err(Error::Encode { topic, source }),
        }
    }
}
