//! Connection state machine
//!
//! Tracks the lifecycle of one station connection from the first connect
//! attempt to explicit close.
//!
//! ```text
//!  Disconnected ──open()──► Connecting ──ok──► Open
//!                              │   ▲            │
//!                         fail │   │ backoff    │ dropped
//!                              ▼   │ elapsed    ▼
//!                           Reconnecting ◄──────┘
//!
//!  any ──close()──► Closed (terminal)
//! ```

use std::time::{Duration, Instant};

use crate::error::Error;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, no attempt made yet
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Socket open and handshake sent
    Open,
    /// Waiting for the next attempt (or for a manual retry once exhausted)
    Reconnecting,
    /// Explicitly closed
    Closed,
}

impl ConnectionState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Open) | (Connecting, Reconnecting) => true,
            (Open, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }

    /// Lowercase name used in logs and health reports
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable per-connection status shared between the handle and its driver
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Current state
    pub state: ConnectionState,

    /// Consecutive failed attempts since the last successful open
    pub attempts: u32,

    /// When the connection last reached Open
    pub last_open: Option<Instant>,

    /// Most recent failure
    pub last_error: Option<Error>,

    /// Delay armed for the pending retry, if any
    pub next_retry_in: Option<Duration>,

    /// Whether the attempt cap was hit and automatic retries stopped
    pub exhausted: bool,

    /// Data frames written since creation
    pub frames_sent: u64,

    /// Data frames received since creation
    pub frames_received: u64,

    /// Number of times the connection reached Open
    pub opens: u64,

    /// When the status was created
    pub created_at: Instant,
}

impl ConnectionStatus {
    /// Create a new status in Disconnected
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            last_open: None,
            last_error: None,
            next_retry_in: None,
            exhausted: false,
            frames_sent: 0,
            frames_received: 0,
            opens: 0,
            created_at: Instant::now(),
        }
    }

    /// Move to `next` if the edge is legal; returns whether it moved
    fn transition(&mut self, next: ConnectionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::trace!(from = %self.state, to = %next, "Refused state transition");
            false
        }
    }

    /// Begin a connect attempt
    pub fn start_connecting(&mut self) -> bool {
        let moved = self.transition(ConnectionState::Connecting);
        if moved {
            self.next_retry_in = None;
            self.exhausted = false;
        }
        moved
    }

    /// Connect attempt succeeded
    pub fn mark_open(&mut self) -> bool {
        let moved = self.transition(ConnectionState::Open);
        if moved {
            self.attempts = 0;
            self.last_open = Some(Instant::now());
            self.last_error = None;
            self.opens += 1;
        }
        moved
    }

    /// Attempt failed or open connection dropped; returns the new attempt count
    pub fn mark_failed(&mut self, error: Error) -> Option<u32> {
        if !self.transition(ConnectionState::Reconnecting) {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
        Some(self.attempts)
    }

    /// Record the armed retry delay
    pub fn schedule_retry(&mut self, delay: Duration) {
        self.next_retry_in = Some(delay);
    }

    /// Attempt cap reached; no automatic retry is pending
    pub fn mark_exhausted(&mut self, error: Error) {
        self.next_retry_in = None;
        self.exhausted = true;
        self.last_error = Some(error);
    }

    /// Manual re-trigger: fresh attempt budget
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
    }

    /// Terminal close
    pub fn close(&mut self) -> bool {
        let moved = self.transition(ConnectionState::Closed);
        if moved {
            self.next_retry_in = None;
        }
        moved
    }

    /// Check if the connection is open
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Time since the connection last opened, while it is still open
    pub fn uptime(&self) -> Option<Duration> {
        if self.is_open() {
            self.last_open.map(|t| t.elapsed())
        } else {
            None
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}
