//! Connection registry implementation
//!
//! The registry is the sole owner of live connections, keyed by endpoint id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::connection::{Connection, ConnectionSnapshot, ConnectionState};
use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::Result;
use crate::events::EventHub;
use crate::payload::Payload;

use super::config::RegistryConfig;
use super::error::RegistryError;

/// Map of endpoint id to managed connection
///
/// Thread-safe via `RwLock`. Queries and sends take the read lock; create,
/// remove and replace take the write lock only to edit the map. Shutdowns
/// are awaited after the lock is released, so a slow or stalled peer never
/// blocks calls on other ids.
pub struct ConnectionRegistry {
    /// Map of endpoint id to connection
    connections: RwLock<HashMap<EndpointId, Arc<Connection>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn build(&self, descriptor: EndpointDescriptor, hub: &Arc<EventHub>) -> Arc<Connection> {
        Arc::new(Connection::new(
            descriptor,
            self.config.connection.clone(),
            Arc::clone(&self.config.handshake),
            Arc::clone(hub),
        ))
    }

    /// Create and open a connection
    ///
    /// Fails with `InvalidEndpoint` if the descriptor does not validate and
    /// with `AlreadyExists` if the id is live. Must be called from within a
    /// tokio runtime.
    pub async fn create(
        &self,
        descriptor: EndpointDescriptor,
        hub: &Arc<EventHub>,
    ) -> Result<ConnectionSnapshot> {
        descriptor.validate()?;

        let mut connections = self.connections.write().await;
        if connections.contains_key(&descriptor.id) {
            return Err(RegistryError::AlreadyExists(descriptor.id).into());
        }

        let id = descriptor.id.clone();
        let conn = self.build(descriptor, hub);
        conn.open();
        let snapshot = conn.snapshot();
        connections.insert(id.clone(), conn);

        tracing::info!(
            endpoint = %id,
            url = %snapshot.url,
            connections = connections.len(),
            "Connection created"
        );

        Ok(snapshot)
    }

    /// Close and drop a connection
    ///
    /// The id is gone from the registry as soon as this is called; the
    /// driver is then awaited until it releases its socket and timer.
    /// Returns the final snapshot, or `None` if the id was not registered.
    pub async fn remove(&self, id: &EndpointId) -> Option<ConnectionSnapshot> {
        let (conn, remaining) = {
            let mut connections = self.connections.write().await;
            let conn = connections.remove(id)?;
            (conn, connections.len())
        };
        conn.shutdown().await;

        tracing::info!(endpoint = %id, connections = remaining, "Connection removed");

        Some(conn.snapshot())
    }

    /// Swap the connection for `descriptor.id` with a fresh one
    ///
    /// The new connection takes the id at once but only opens after the old
    /// one is fully shut down. An absent id is simply created. If the id is
    /// removed while the old connection is shutting down, the new one never
    /// opens.
    pub async fn replace(
        &self,
        descriptor: EndpointDescriptor,
        hub: &Arc<EventHub>,
    ) -> Result<ConnectionSnapshot> {
        descriptor.validate()?;

        let id = descriptor.id.clone();
        let new_url = descriptor.url();
        let conn = self.build(descriptor, hub);
        let old = {
            let mut connections = self.connections.write().await;
            connections.insert(id.clone(), Arc::clone(&conn))
        };

        if let Some(old) = old {
            old.shutdown().await;
            tracing::debug!(
                endpoint = %id,
                old_url = %old.descriptor().url(),
                new_url = %new_url,
                "Old connection shut down for replacement"
            );
        }

        conn.open();
        let snapshot = conn.snapshot();

        tracing::info!(endpoint = %id, url = %snapshot.url, "Connection replaced");

        Ok(snapshot)
    }

    /// Get a snapshot of one connection
    pub async fn get(&self, id: &EndpointId) -> Option<ConnectionSnapshot> {
        let connections = self.connections.read().await;
        connections.get(id).map(|conn| conn.snapshot())
    }

    /// Check if an id is registered
    pub async fn has(&self, id: &EndpointId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Get total number of connections
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Registered ids, sorted
    pub async fn ids(&self) -> Vec<EndpointId> {
        let connections = self.connections.read().await;
        let mut ids: Vec<EndpointId> = connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current state of every connection
    pub async fn all_states(&self) -> HashMap<EndpointId, ConnectionState> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .map(|(id, conn)| (id.clone(), conn.state()))
            .collect()
    }

    /// Snapshots of every connection, sorted by id
    pub async fn snapshots(&self) -> Vec<ConnectionSnapshot> {
        let connections = self.connections.read().await;
        let mut snapshots: Vec<ConnectionSnapshot> =
            connections.values().map(|conn| conn.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id().cmp(b.id()));
        snapshots
    }

    /// Queue a frame on one connection
    pub async fn send(&self, id: &EndpointId, payload: Payload) -> Result<()> {
        let connections = self.connections.read().await;
        let conn = connections
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        conn.send(payload)
    }

    /// Re-send the handshake on one open connection
    pub async fn resubscribe(&self, id: &EndpointId) -> Result<()> {
        let connections = self.connections.read().await;
        let conn = connections
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        conn.resubscribe()
    }

    /// Re-send the handshake on every open connection; returns how many
    /// were reached
    pub async fn resubscribe_all(&self) -> usize {
        let connections = self.connections.read().await;
        let reached = connections
            .values()
            .filter(|conn| conn.resubscribe().is_ok())
            .count();

        tracing::debug!(reached, total = connections.len(), "Resubscribed open connections");
        reached
    }

    /// Retry one connection now if it is waiting in Reconnecting
    ///
    /// Returns whether a retry was triggered.
    pub async fn reconnect(&self, id: &EndpointId) -> Result<bool> {
        let connections = self.connections.read().await;
        let conn = connections
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        Ok(conn.reconnect())
    }

    /// Retry every connection waiting in Reconnecting; returns how many
    /// were triggered
    pub async fn reconnect_all(&self) -> usize {
        let connections = self.connections.read().await;
        let triggered = connections.values().filter(|conn| conn.reconnect()).count();

        tracing::info!(triggered, total = connections.len(), "Manual reconnect of all connections");
        triggered
    }

    /// Close and drop every connection
    ///
    /// Shutdowns run concurrently and every driver is awaited. Returns how
    /// many connections were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, conn)| conn).collect()
        };

        let closed = drained.len();
        futures_util::future::join_all(drained.iter().map(|conn| conn.shutdown())).await;

        if closed > 0 {
            tracing::info!(closed, "All connections closed");
        }
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
