//! Registry configuration

use std::sync::Arc;

use crate::connection::ConnectionConfig;
use crate::handshake::{JsonRpcSubscription, SubscriptionHandshake};

/// Settings applied to every connection the registry creates
#[derive(Clone)]
pub struct RegistryConfig {
    /// Timeouts, backoff and attempt cap for each connection
    pub connection: ConnectionConfig,

    /// Handshake written after every open
    pub handshake: Arc<dyn SubscriptionHandshake>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            handshake: Arc::new(JsonRpcSubscription::default()),
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl RegistryConfig {
    /// Set the per-connection configuration
    pub fn connection(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    /// Set the subscription handshake
    pub fn handshake(mut self, handshake: impl SubscriptionHandshake) -> Self {
        self.handshake = Arc::new(handshake);
        self
    }
}
