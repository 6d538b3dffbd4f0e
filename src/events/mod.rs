//! Connection events and callback fan-out

pub mod event;
pub mod hub;

pub use event::{ConnectionEvent, EventKind, TaggedEvent};
pub use hub::{EventHub, EventHubBuilder};

pub(crate) use hub::EventSink;
