//! Error types
//!
//! Transport failures are recovered by each connection's retry loop and only
//! surface as events carrying one of these values. Registry misuse and sends
//! on a connection that is not open are returned to the caller directly.

use crate::endpoint::EndpointId;
use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for connection and manager operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A connect attempt failed before the connection opened
    #[error("connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: EndpointId, reason: String },

    /// An open connection was dropped by the peer or the network
    #[error("connection to {endpoint} closed unexpectedly: {reason}")]
    UnexpectedClose { endpoint: EndpointId, reason: String },

    /// Attempted to send while the connection is not open
    #[error("cannot send to {0}: not connected")]
    NotConnected(EndpointId),

    /// Writing the subscription handshake failed
    #[error("handshake send to {endpoint} failed: {reason}")]
    HandshakeSendFailed { endpoint: EndpointId, reason: String },

    /// The reconnect attempt cap was reached
    #[error("gave up reconnecting to {endpoint} after {attempts} attempts")]
    ReconnectExhausted { endpoint: EndpointId, attempts: u32 },

    /// Read or write error on an open socket
    #[error("transport error on {endpoint}: {reason}")]
    Transport { endpoint: EndpointId, reason: String },

    /// Endpoint descriptor failed validation
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: EndpointId, reason: String },

    /// Payload could not be encoded
    #[error("failed to serialize payload: {0}")]
    Serialize(String),

    /// Registry misuse (duplicate or missing id)
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl Error {
    /// Endpoint the error refers to, if any
    pub fn endpoint(&self) -> Option<&EndpointId> {
        match self {
            Error::ConnectFailed { endpoint, .. }
            | Error::UnexpectedClose { endpoint, .. }
            | Error::HandshakeSendFailed { endpoint, .. }
            | Error::ReconnectExhausted { endpoint, .. }
            | Error::Transport { endpoint, .. }
            | Error::InvalidEndpoint { endpoint, .. } => Some(endpoint),
            Error::NotConnected(endpoint) => Some(endpoint),
            Error::Registry(err) => Some(err.endpoint()),
            Error::Serialize(_) => None,
        }
    }

    /// Whether the retry loop recovers from this error on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConnectFailed { .. }
                | Error::UnexpectedClose { .. }
                | Error::HandshakeSendFailed { .. }
                | Error::Transport { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::ConnectFailed {
            endpoint: EndpointId::from("A"),
            reason: "refused".into(),
        };
        assert_eq!(err.to_string(), "connect to A failed: refused");

        let err = Error::NotConnected(EndpointId::from("B"));
        assert_eq!(err.to_string(), "cannot send to B: not connected");
    }

    #[test]
    fn test_registry_error_conversion() {
        let err: Error = RegistryError::NotFound(EndpointId::from("C")).into();
        assert!(matches!(err, Error::Registry(RegistryError::NotFound(_))));
        assert_eq!(err.endpoint().map(EndpointId::as_str), Some("C"));
        assert_eq!(err.to_string(), "connection not found: C");
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialize(_)));
        assert!(err.endpoint().is_none());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        let id = EndpointId::from("A");
        assert!(Error::UnexpectedClose {
            endpoint: id.clone(),
            reason: "eof".into()
        }
        .is_transient());
        assert!(!Error::NotConnected(id.clone()).is_transient());
        assert!(!Error::ReconnectExhausted {
            endpoint: id,
            attempts: 3
        }
        .is_transient());
    }
}
