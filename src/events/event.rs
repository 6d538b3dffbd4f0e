//! Lifecycle and message events

use crate::endpoint::EndpointId;
use crate::error::Error;
use crate::payload::Payload;

/// Event produced by a connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Connection opened and handshake written
    Connected,

    /// Attempt failed or open connection dropped
    Disconnected { reason: String },

    /// Data frame received
    Message(Payload),

    /// Connect, handshake or transport failure
    Error(Error),

    /// Attempt cap reached, automatic retries stopped
    ReconnectFailed { attempts: u32 },

    /// Connection closed on request; nothing follows this event
    Closed,
}

impl ConnectionEvent {
    /// Short name used in logs
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectionEvent::Connected => EventKind::Connected,
            ConnectionEvent::Disconnected { .. } => EventKind::Disconnected,
            ConnectionEvent::Message(_) => EventKind::Message,
            ConnectionEvent::Error(_) => EventKind::Error,
            ConnectionEvent::ReconnectFailed { .. } => EventKind::ReconnectFailed,
            ConnectionEvent::Closed => EventKind::Closed,
        }
    }
}

/// Discriminant of [`ConnectionEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Message,
    Error,
    ReconnectFailed,
    Closed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::ReconnectFailed => "reconnect_failed",
            EventKind::Closed => "closed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event together with the endpoint it came from
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub endpoint: EndpointId,
    pub event: ConnectionEvent,
}
