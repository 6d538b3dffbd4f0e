//! Frame payloads
//!
//! Inbound text frames are parsed as JSON when possible and passed through
//! unchanged otherwise. The same type is used for outbound frames.

use bytes::Bytes;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Body of a single WebSocket data frame
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text frame that parsed as JSON
    Json(Value),
    /// Text frame that is not valid JSON
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

impl Payload {
    /// Interpret a text frame, falling back to raw text on parse failure
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text.to_owned()),
        }
    }

    /// Convert an inbound frame; control frames yield `None`
    pub(crate) fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::from_text(text.as_str())),
            Message::Binary(data) => Some(Payload::Binary(data)),
            _ => None,
        }
    }

    /// Encode as an outbound frame
    pub(crate) fn into_message(self) -> Message {
        match self {
            Payload::Json(value) => Message::text(value.to_string()),
            Payload::Text(text) => Message::text(text),
            Payload::Binary(data) => Message::binary(data),
        }
    }

    /// The JSON value, if this payload parsed as JSON
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Size of the encoded body in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Json(value) => value.to_string().len(),
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}
