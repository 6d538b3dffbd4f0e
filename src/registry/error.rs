//! Registry error types

use crate::endpoint::EndpointId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A live connection already uses this id
    #[error("connection already exists: {0}")]
    AlreadyExists(EndpointId),

    /// No connection with this id
    #[error("connection not found: {0}")]
    NotFound(EndpointId),
}

impl RegistryError {
    /// Endpoint the error refers to
    pub fn endpoint(&self) -> &EndpointId {
        match self {
            RegistryError::AlreadyExists(id) | RegistryError::NotFound(id) => id,
        }
    }
}
