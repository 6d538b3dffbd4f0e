//! Reconnecting WebSocket links to a changing set of stations
//!
//! `station-link` keeps one long-lived WebSocket per remote station. Each
//! connection reconnects on its own with backoff and re-sends a subscription
//! handshake after every open. The set of connections is reconciled
//! incrementally against the station list the application supplies, and
//! every lifecycle or message event reaches caller callbacks tagged with the
//! station id.
//!
//! # Quick start
//!
//! ```no_run
//! use station_link::{EndpointDescriptor, EventHub, ManagerConfig, ConnectionConfig, StationManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = EventHub::builder()
//!         .on_connected(|id| println!("{id}: connected"))
//!         .on_disconnected(|id, reason| println!("{id}: {reason}"))
//!         .on_message(|id, payload| println!("{id}: {payload:?}"))
//!         .on_reconnect_failed(|id, attempts| println!("{id}: gave up after {attempts}"))
//!         .build();
//!
//!     let config = ManagerConfig::default().connection(ConnectionConfig::station_defaults());
//!     let manager = StationManager::with_config(config, hub);
//!
//!     manager
//!         .reconcile(&[
//!             EndpointDescriptor::new("north", "10.0.0.1", 9000),
//!             EndpointDescriptor::new("south", "10.0.0.2", 9000),
//!         ])
//!         .await;
//!
//!     // Station list changed: "south" moved, "north" was decommissioned
//!     manager
//!         .reconcile(&[EndpointDescriptor::new("south", "10.0.0.20", 9000)])
//!         .await;
//!
//!     manager.close_all().await;
//! }
//! ```
//!
//! # Modules
//!
//! - [`connection`]: per-endpoint state machine, driver task and backoff
//! - [`registry`]: owner of all live connections
//! - [`reconcile`]: endpoint list diffing
//! - [`events`]: typed callback slots
//! - [`manager`]: application-facing facade

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod handshake;
pub mod manager;
pub mod payload;
pub mod probe;
pub mod reconcile;
pub mod registry;
pub mod stats;

pub use connection::{
    BackoffPolicy, ConnectionConfig, ConnectionSnapshot, ConnectionState, ConnectionStatus,
};
pub use endpoint::{EndpointDescriptor, EndpointId};
pub use error::{Error, Result};
pub use events::{ConnectionEvent, EventHub, EventKind, TaggedEvent};
pub use handshake::{JsonRpcSubscription, SubscriptionHandshake};
pub use manager::{ManagerConfig, StationManager};
pub use payload::Payload;
pub use probe::{probe, probe_all, ProbeReport};
pub use reconcile::{ReconcileAction, ReconcilePlan, ReconcileReport};
pub use registry::{ConnectionRegistry, RegistryConfig, RegistryError};
pub use stats::{ConnectionHealth, HealthStatus, ManagerStats};
