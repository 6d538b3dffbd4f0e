//! Point-in-time view of a connection

use std::time::Duration;

use crate::endpoint::{EndpointDescriptor, EndpointId};

use super::state::{ConnectionState, ConnectionStatus};

/// Copy of a connection's status taken under its lock
///
/// Queries return snapshots; callers never hold the connection itself.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub descriptor: EndpointDescriptor,
    pub url: String,
    pub status: ConnectionStatus,
}

impl ConnectionSnapshot {
    pub fn id(&self) -> &EndpointId {
        &self.descriptor.id
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Failed attempts since the last open
    pub fn attempts(&self) -> u32 {
        self.status.attempts
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.status.uptime()
    }
}
