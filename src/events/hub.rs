//! Event fan-out to caller callbacks
//!
//! The hub holds one optional callback per event kind. Each connection's
//! driver task dispatches its own events, so events for one endpoint arrive
//! in order and never concurrently; events for different endpoints may
//! interleave. A callback that panics is caught and logged without affecting
//! later dispatches.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::endpoint::EndpointId;
use crate::error::Error;
use crate::payload::Payload;

use super::event::{ConnectionEvent, EventKind, TaggedEvent};

type IdCallback = Arc<dyn Fn(&EndpointId) + Send + Sync>;
type ReasonCallback = Arc<dyn Fn(&EndpointId, &str) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(&EndpointId, &Payload) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&EndpointId, &Error) + Send + Sync>;
type AttemptsCallback = Arc<dyn Fn(&EndpointId, u32) + Send + Sync>;
type AnyCallback = Arc<dyn Fn(&TaggedEvent) + Send + Sync>;

/// Typed callback slots for connection events
#[derive(Clone, Default)]
pub struct EventHub {
    connected: Option<IdCallback>,
    disconnected: Option<ReasonCallback>,
    message: Option<MessageCallback>,
    error: Option<ErrorCallback>,
    reconnect_failed: Option<AttemptsCallback>,
    closed: Option<IdCallback>,
    any: Option<AnyCallback>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("connected", &self.connected.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .field("message", &self.message.is_some())
            .field("error", &self.error.is_some())
            .field("reconnect_failed", &self.reconnect_failed.is_some())
            .field("closed", &self.closed.is_some())
            .field("any", &self.any.is_some())
            .finish()
    }
}

impl EventHub {
    /// Hub with no callbacks; events are only logged
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a hub
    pub fn builder() -> EventHubBuilder {
        EventHubBuilder::default()
    }

    /// Hub that forwards every event into an unbounded channel
    ///
    /// Per-endpoint order is preserved in the channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self::builder()
            .on_any(move |event| {
                let _ = tx.send(event.clone());
            })
            .build();
        (hub, rx)
    }

    /// Deliver one event to its slot and to the catch-all slot
    pub fn dispatch(&self, endpoint: &EndpointId, event: ConnectionEvent) {
        let kind = event.kind();

        match &event {
            ConnectionEvent::Connected => {
                if let Some(cb) = &self.connected {
                    isolate(endpoint, kind, || cb(endpoint));
                }
            }
            ConnectionEvent::Disconnected { reason } => {
                if let Some(cb) = &self.disconnected {
                    isolate(endpoint, kind, || cb(endpoint, reason));
                }
            }
            ConnectionEvent::Message(payload) => {
                if let Some(cb) = &self.message {
                    isolate(endpoint, kind, || cb(endpoint, payload));
                }
            }
            ConnectionEvent::Error(err) => {
                if let Some(cb) = &self.error {
                    isolate(endpoint, kind, || cb(endpoint, err));
                }
            }
            ConnectionEvent::ReconnectFailed { attempts } => {
                if let Some(cb) = &self.reconnect_failed {
                    isolate(endpoint, kind, || cb(endpoint, *attempts));
                }
            }
            ConnectionEvent::Closed => {
                if let Some(cb) = &self.closed {
                    isolate(endpoint, kind, || cb(endpoint));
                }
            }
        }

        if let Some(cb) = &self.any {
            let tagged = TaggedEvent {
                endpoint: endpoint.clone(),
                event,
            };
            isolate(endpoint, kind, || cb(&tagged));
        }
    }
}

fn isolate(endpoint: &EndpointId, kind: EventKind, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(endpoint = %endpoint, event = %kind, "Event callback panicked");
    }
}

/// Builder for [`EventHub`]
#[derive(Default)]
pub struct EventHubBuilder {
    hub: EventHub,
}

impl EventHubBuilder {
    /// Connection opened
    pub fn on_connected(mut self, f: impl Fn(&EndpointId) + Send + Sync + 'static) -> Self {
        self.hub.connected = Some(Arc::new(f));
        self
    }

    /// Attempt failed or connection dropped
    pub fn on_disconnected(
        mut self,
        f: impl Fn(&EndpointId, &str) + Send + Sync + 'static,
    ) -> Self {
        self.hub.disconnected = Some(Arc::new(f));
        self
    }

    /// Data frame received
    pub fn on_message(mut self, f: impl Fn(&EndpointId, &Payload) + Send + Sync + 'static) -> Self {
        self.hub.message = Some(Arc::new(f));
        self
    }

    /// Connect, handshake or transport failure
    pub fn on_error(mut self, f: impl Fn(&EndpointId, &Error) + Send + Sync + 'static) -> Self {
        self.hub.error = Some(Arc::new(f));
        self
    }

    /// Retries exhausted
    pub fn on_reconnect_failed(
        mut self,
        f: impl Fn(&EndpointId, u32) + Send + Sync + 'static,
    ) -> Self {
        self.hub.reconnect_failed = Some(Arc::new(f));
        self
    }

    /// Connection closed on request
    pub fn on_closed(mut self, f: impl Fn(&EndpointId) + Send + Sync + 'static) -> Self {
        self.hub.closed = Some(Arc::new(f));
        self
    }

    /// Every event, after its typed slot
    pub fn on_any(mut self, f: impl Fn(&TaggedEvent) + Send + Sync + 'static) -> Self {
        self.hub.any = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> EventHub {
        self.hub
    }
}

/// Event hub bound to one endpoint, held by that endpoint's driver
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    endpoint: EndpointId,
    hub: Arc<EventHub>,
}

impl EventSink {
    pub(crate) fn new(endpoint: EndpointId, hub: Arc<EventHub>) -> Self {
        Self { endpoint, hub }
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        tracing::trace!(endpoint = %self.endpoint, event = %event.kind(), "Dispatching event");
        self.hub.dispatch(&self.endpoint, event);
    }
}
