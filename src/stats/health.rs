//! Connection health reports

use std::time::{Duration, Instant};

use crate::connection::{ConnectionSnapshot, ConnectionState};
use crate::endpoint::EndpointId;

/// Coarse health bucket for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    /// Open and subscribed
    Connected,
    /// Attempt in flight or retry pending
    Connecting,
    /// Retries exhausted, or closed
    Disconnected,
    /// Not started yet
    Unknown,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Connected => "connected",
            HealthStatus::Connecting => "connecting",
            HealthStatus::Disconnected => "disconnected",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one connection
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    /// Endpoint id
    pub endpoint: EndpointId,
    /// Coarse status
    pub status: HealthStatus,
    /// Exact state
    pub state: ConnectionState,
    /// When the connection last opened
    pub last_open: Option<Instant>,
    /// Time since last open, while open
    pub uptime: Option<Duration>,
    /// Failed attempts since the last open
    pub reconnect_count: u32,
    /// Delay of the pending retry, if any
    pub next_retry_in: Option<Duration>,
    /// Most recent failure
    pub error: Option<String>,
    /// Frames written
    pub frames_sent: u64,
    /// Frames received
    pub frames_received: u64,
}

impl ConnectionHealth {
    /// Build a report from a snapshot
    pub fn from_snapshot(snapshot: &ConnectionSnapshot) -> Self {
        let status = &snapshot.status;
        let bucket = match status.state {
            ConnectionState::Open => HealthStatus::Connected,
            ConnectionState::Connecting => HealthStatus::Connecting,
            ConnectionState::Reconnecting if !status.exhausted => HealthStatus::Connecting,
            ConnectionState::Reconnecting | ConnectionState::Closed => HealthStatus::Disconnected,
            ConnectionState::Disconnected => HealthStatus::Unknown,
        };

        Self {
            endpoint: snapshot.id().clone(),
            status: bucket,
            state: status.state,
            last_open: status.last_open,
            uptime: status.uptime(),
            reconnect_count: status.attempts,
            next_retry_in: status.next_retry_in,
            error: status.last_error.as_ref().map(ToString::to_string),
            frames_sent: status.frames_sent,
            frames_received: status.frames_received,
        }
    }

    /// Check if the connection is open
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Connected
    }
}

/// Aggregate counts across all connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Total connections
    pub total: usize,
    /// Open
    pub open: usize,
    /// Connecting or waiting to retry
    pub connecting: usize,
    /// Retries exhausted
    pub exhausted: usize,
    /// Data frames written across all connections
    pub frames_sent: u64,
    /// Data frames received across all connections
    pub frames_received: u64,
}

impl ManagerStats {
    /// Fold snapshots into counts
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a ConnectionSnapshot>) -> Self {
        let mut stats = Self::default();
        for snapshot in snapshots {
            let status = &snapshot.status;
            stats.total += 1;
            match status.state {
                ConnectionState::Open => stats.open += 1,
                ConnectionState::Reconnecting if status.exhausted => stats.exhausted += 1,
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    stats.connecting += 1
                }
                _ => {}
            }
            stats.frames_sent += status.frames_sent;
            stats.frames_received += status.frames_received;
        }
        stats
    }

    /// Connections not open
    pub fn down(&self) -> usize {
        self.total - self.open
    }
}
