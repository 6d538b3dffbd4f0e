//! Subscription handshake policy
//!
//! Every time a connection reaches Open, the driver writes the message
//! produced by the configured [`SubscriptionHandshake`] before any other
//! outbound frame. The same message can be re-sent on demand without
//! reconnecting.

use serde::Serialize;
use serde_json::{json, Value};

use crate::endpoint::EndpointId;
use crate::error::Result;
use crate::payload::Payload;

/// Produces the message sent right after a connection opens
pub trait SubscriptionHandshake: Send + Sync + 'static {
    /// Message to write for the given endpoint
    fn message(&self, endpoint: &EndpointId) -> Payload;
}

impl<F> SubscriptionHandshake for F
where
    F: Fn(&EndpointId) -> Payload + Send + Sync + 'static,
{
    fn message(&self, endpoint: &EndpointId) -> Payload {
        self(endpoint)
    }
}

/// JSON-RPC notification subscription envelope
///
/// Stations expect the request wrapped in `"<"`/`">"` marker fields, with
/// the opening marker first and the closing marker last:
///
/// ```text
/// {"<":"","cmd":"rpc","jsonrpc":"2.0","method":"NotificationSubscription",
///  "params":{"type":{"UnOkAlarm":true}},"id":1,">":""}
/// ```
///
/// Field order is part of the wire format, so the envelope is encoded
/// straight from the struct rather than through a `Value` map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcSubscription {
    #[serde(rename = "<")]
    open_marker: &'static str,
    cmd: &'static str,
    jsonrpc: &'static str,
    /// Remote method name
    pub method: String,
    /// Event categories of interest
    pub params: Value,
    /// Request id (not required to be unique)
    pub id: u64,
    #[serde(rename = ">")]
    close_marker: &'static str,
}

impl JsonRpcSubscription {
    /// Subscription for an arbitrary method and parameter set
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            open_marker: "",
            cmd: "rpc",
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id: 1,
            close_marker: "",
        }
    }

    /// Set the request id
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Encode to the exact wire text, fields in declaration order
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode to a JSON value (key order is not preserved)
    pub fn to_value(&self) -> Value {
        // Serializing a struct of strings and a Value cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for JsonRpcSubscription {
    /// Subscribe to alarm state changes
    fn default() -> Self {
        Self::new(
            "NotificationSubscription",
            json!({ "type": { "UnOkAlarm": true } }),
        )
    }
}

impl SubscriptionHandshake for JsonRpcSubscription {
    fn message(&self, endpoint: &EndpointId) -> Payload {
        match self.encode() {
            Ok(text) => Payload::Text(text),
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "Failed to encode subscription");
                Payload::Json(self.to_value())
            }
        }
    }
}
