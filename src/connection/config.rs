//! Connection configuration

use std::time::Duration;

use super::backoff::BackoffPolicy;

/// Default number of automatic retries before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Per-connection configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Connect attempt must complete within this time
    pub connect_timeout: Duration,

    /// Delay policy between retries
    pub backoff: BackoffPolicy,

    /// Automatic retries after a failure (None = retry forever)
    pub max_attempts: Option<u32>,

    /// A single outbound frame must be flushed within this time
    pub write_timeout: Duration,

    /// How long to wait for the close handshake on shutdown
    pub close_timeout: Duration,

    /// Disable Nagle's algorithm on the underlying socket
    pub tcp_nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            backoff: BackoffPolicy::default(),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            write_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(1),
            tcp_nodelay: true,
        }
    }
}

impl ConnectionConfig {
    /// Settings the dashboard used for station links: 10s timeout,
    /// three retries, linear 2s steps
    pub fn station_defaults() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::linear(Duration::from_secs(2), Duration::from_secs(5)),
            max_attempts: Some(3),
            ..Default::default()
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the backoff policy
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Cap automatic retries
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Retry forever
    pub fn unlimited_attempts(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Set the per-frame write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set close handshake timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Toggle TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Whether another automatic retry is allowed after `attempts` failures
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts <= max)
    }
}
