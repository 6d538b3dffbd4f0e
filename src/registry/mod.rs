//! Connection registry
//!
//! The registry owns every live connection and is the only place connections
//! are created or destroyed. Callers address connections by endpoint id and
//! get [`ConnectionSnapshot`](crate::connection::ConnectionSnapshot)s back.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ConnectionRegistry>
//!                 ┌───────────────────────────┐
//!                 │ connections: HashMap<Id,  │
//!                 │   Arc<Connection {        │
//!                 │     status, commands_tx,  │
//!                 │     cancel, task,         │
//!                 │   }>                      │
//!                 │ >                         │
//!                 └─────────────┬─────────────┘
//!                               │ spawn
//!         ┌─────────────────────┼─────────────────────┐
//!         ▼                     ▼                     ▼
//!    [Driver A]            [Driver B]            [Driver C]
//!    socket, timer         socket, timer         socket, timer
//!         │                     │                     │
//!         └──────────► EventHub callbacks ◄───────────┘
//! ```

pub mod config;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use store::ConnectionRegistry;
