//! Station manager
//!
//! Application-facing facade. The manager remembers the endpoint list it
//! last applied, diffs every new list against it, and exposes the per-id
//! commands and queries of the registry.
//!
//! # Example
//!
//! ```no_run
//! use station_link::{EndpointDescriptor, EventHub, StationManager};
//!
//! # async fn run() {
//! let hub = EventHub::builder()
//!     .on_connected(|id| println!("{id} connected"))
//!     .on_message(|id, payload| println!("{id}: {payload:?}"))
//!     .build();
//!
//! let manager = StationManager::new(hub);
//! manager
//!     .reconcile(&[EndpointDescriptor::new("north", "10.0.0.1", 9000)])
//!     .await;
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::connection::{ConnectionConfig, ConnectionState};
use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::Result;
use crate::events::EventHub;
use crate::handshake::SubscriptionHandshake;
use crate::payload::Payload;
use crate::probe::{self, ProbeReport, DEFAULT_PROBE_TIMEOUT};
use crate::reconcile::{dedup_by_id, ReconcilePlan, ReconcileReport};
use crate::registry::{ConnectionRegistry, RegistryConfig, RegistryError};
use crate::stats::{ConnectionHealth, ManagerStats};

/// Manager configuration options
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Connection settings and handshake
    pub registry: RegistryConfig,

    /// Timeout for diagnostic probes
    pub probe_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    /// Set per-connection configuration
    pub fn connection(mut self, config: ConnectionConfig) -> Self {
        self.registry = self.registry.connection(config);
        self
    }

    /// Set the subscription handshake
    pub fn handshake(mut self, handshake: impl SubscriptionHandshake) -> Self {
        self.registry = self.registry.handshake(handshake);
        self
    }

    /// Set probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Keeps one live connection per station in the applied list
pub struct StationManager {
    registry: ConnectionRegistry,
    hub: Arc<EventHub>,
    /// Last applied list; `None` until the first reconcile
    applied: Mutex<Option<Vec<EndpointDescriptor>>>,
    probe_timeout: Duration,
}

impl StationManager {
    /// Create a manager with default configuration
    pub fn new(hub: EventHub) -> Self {
        Self::with_config(ManagerConfig::default(), hub)
    }

    /// Create a manager with custom configuration
    pub fn with_config(config: ManagerConfig, hub: EventHub) -> Self {
        Self {
            registry: ConnectionRegistry::with_config(config.registry),
            hub: Arc::new(hub),
            applied: Mutex::new(None),
            probe_timeout: config.probe_timeout,
        }
    }

    /// Get the event hub
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Bring the live connection set in line with `endpoints`
    ///
    /// Calls are serialized. Entries with a duplicate id are ignored after
    /// the first. Entries whose action failed are left out of the applied
    /// list, or keep their previous descriptor if the old connection is
    /// still live, so the next call retries them.
    pub async fn reconcile(&self, endpoints: &[EndpointDescriptor]) -> ReconcileReport {
        let mut applied = self.applied.lock().await;
        let plan = ReconcilePlan::compute(applied.as_deref(), endpoints);

        if plan.is_empty() && applied.is_some() {
            tracing::debug!(endpoints = endpoints.len(), "Endpoint list unchanged");
            return ReconcileReport::default();
        }

        tracing::info!(
            removed = plan.removed.len(),
            added = plan.added.len(),
            modified = plan.modified.len(),
            "Reconciling endpoint list"
        );

        let report = plan.apply(&self.registry, &self.hub).await;

        let previous = applied.take().unwrap_or_default();
        let mut next = Vec::new();
        for descriptor in dedup_by_id(endpoints) {
            if !report.failed_for(&descriptor.id) {
                next.push(descriptor);
            } else if let Some(prev) = previous.iter().find(|d| d.id == descriptor.id) {
                if self.registry.has(&prev.id).await {
                    next.push(prev.clone());
                }
            }
        }
        *applied = Some(next);

        report
    }

    /// Endpoint list as last applied
    pub async fn applied(&self) -> Vec<EndpointDescriptor> {
        self.applied.lock().await.clone().unwrap_or_default()
    }

    /// Queue a frame for one station
    ///
    /// Fails with `NotConnected` unless the connection is open.
    pub async fn send(&self, id: &EndpointId, payload: impl Into<Payload>) -> Result<()> {
        self.registry.send(id, payload.into()).await
    }

    /// Close one connection and drop it from the applied list
    pub async fn close_connection(&self, id: &EndpointId) -> Result<()> {
        if self.registry.remove(id).await.is_none() {
            return Err(RegistryError::NotFound(id.clone()).into());
        }

        if let Some(list) = self.applied.lock().await.as_mut() {
            list.retain(|d| &d.id != id);
        }
        Ok(())
    }

    /// Close every connection and forget the applied list
    ///
    /// The next `reconcile` is treated as the initial population.
    pub async fn close_all(&self) -> usize {
        let mut applied = self.applied.lock().await;
        let closed = self.registry.close_all().await;
        *applied = None;
        closed
    }

    /// Get the state of one connection
    pub async fn get_state(&self, id: &EndpointId) -> Option<ConnectionState> {
        self.registry.get(id).await.map(|s| s.state())
    }

    /// Get the state of every connection
    pub async fn get_all_states(&self) -> HashMap<EndpointId, ConnectionState> {
        self.registry.all_states().await
    }

    /// Health report for one connection
    pub async fn health(&self, id: &EndpointId) -> Option<ConnectionHealth> {
        self.registry
            .get(id)
            .await
            .map(|s| ConnectionHealth::from_snapshot(&s))
    }

    /// Health reports for every connection, sorted by id
    pub async fn all_health(&self) -> Vec<ConnectionHealth> {
        self.registry
            .snapshots()
            .await
            .iter()
            .map(ConnectionHealth::from_snapshot)
            .collect()
    }

    /// Aggregate counts
    pub async fn stats(&self) -> ManagerStats {
        ManagerStats::from_snapshots(&self.registry.snapshots().await)
    }

    /// Re-send the handshake on one open connection
    pub async fn resubscribe(&self, id: &EndpointId) -> Result<()> {
        self.registry.resubscribe(id).await
    }

    /// Re-send the handshake on every open connection
    pub async fn resubscribe_all(&self) -> usize {
        self.registry.resubscribe_all().await
    }

    /// Retry one connection now if it is waiting to reconnect
    pub async fn reconnect(&self, id: &EndpointId) -> Result<bool> {
        self.registry.reconnect(id).await
    }

    /// Retry every connection waiting to reconnect
    pub async fn reconnect_all(&self) -> usize {
        self.registry.reconnect_all().await
    }

    /// Retry the given stations; unknown ids are skipped
    pub async fn reconnect_stations(&self, ids: &[EndpointId]) -> usize {
        let mut triggered = 0;
        for id in ids {
            match self.registry.reconnect(id).await {
                Ok(true) => triggered += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(endpoint = %id, error = %e, "Reconnect skipped"),
            }
        }
        triggered
    }

    /// Get total number of connections
    pub async fn connection_count(&self) -> usize {
        self.registry.count().await
    }

    /// Check if a connection exists for `id`
    pub async fn has_connection(&self, id: &EndpointId) -> bool {
        self.registry.has(id).await
    }

    /// Probe every station in the applied list, one at a time
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let endpoints = self.applied().await;
        probe::probe_all(
            &endpoints,
            self.registry.config().handshake.as_ref(),
            self.probe_timeout,
        )
        .await
    }
}
