//! Managed WebSocket connection
//!
//! Each connection runs one driver task that owns its socket and retry timer.
//! The [`Connection`] handle kept by the registry only shares the status and
//! queues commands, so no handle method blocks on the network.
//!
//! ```text
//!  Disconnected ──► Connecting ──► Open
//!                      ▲   │         │
//!                      │   ▼         ▼
//!                      Reconnecting ◄┘        any ──► Closed
//! ```

pub mod backoff;
pub mod config;
mod driver;
mod handle;
pub mod snapshot;
pub mod state;
mod transport;

pub use backoff::BackoffPolicy;
pub use config::{ConnectionConfig, DEFAULT_MAX_ATTEMPTS};
pub use snapshot::ConnectionSnapshot;
pub use state::{ConnectionState, ConnectionStatus};

pub(crate) use handle::Connection;
pub(crate) use transport::{close_socket, open_socket};
