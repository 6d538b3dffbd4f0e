//! Endpoint identity and addressing
//!
//! An endpoint is one remote station reachable over WebSocket. Its `id` is
//! stable across reconciliations; address or port changes under the same id
//! are modifications, not new endpoints.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable identifier for an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Create a new endpoint id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::borrow::Borrow<str> for EndpointId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Where to reach a station
///
/// Deserializes from the station directory format, which names the fields
/// `name` and `ip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Stable identity
    #[serde(alias = "name")]
    pub id: EndpointId,
    /// IPv4/IPv6 literal or host name
    #[serde(alias = "ip")]
    pub address: String,
    /// TCP port
    pub port: u16,
}

impl EndpointDescriptor {
    /// Create a new descriptor
    pub fn new(id: impl Into<EndpointId>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
        }
    }

    /// WebSocket URL for this endpoint
    ///
    /// IPv6 literals are wrapped in brackets.
    pub fn url(&self) -> String {
        let host = self.address.trim();
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("ws://[{}]:{}", v6, self.port),
            _ => format!("ws://{}:{}", host, self.port),
        }
    }

    /// Whether `other` points at the same address and port
    pub fn same_target(&self, other: &EndpointDescriptor) -> bool {
        self.address.trim() == other.address.trim() && self.port == other.port
    }

    /// Check the descriptor can be turned into a connectable URL
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(Error::InvalidEndpoint {
                endpoint: self.id.clone(),
                reason: reason.to_owned(),
            })
        };

        if self.id.as_str().trim().is_empty() {
            return invalid("empty id");
        }
        let host = self.address.trim();
        if host.is_empty() {
            return invalid("empty address");
        }
        if self.port == 0 {
            return invalid("port 0");
        }
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }
        let hostname_ok = host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
        if !hostname_ok {
            return invalid("address is neither an IP literal nor a host name");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_ipv4() {
        let ep = EndpointDescriptor::new("A", "10.0.0.1", 9000);
        assert_eq!(ep.url(), "ws://10.0.0.1:9000");
    }

    #[test]
    fn test_url_ipv6_bracketed() {
        let ep = EndpointDescriptor::new("A", "fe80::1", 9000);
        assert_eq!(ep.url(), "ws://[fe80::1]:9000");
    }

    #[test]
    fn test_url_hostname() {
        let ep = EndpointDescriptor::new("A", " station-3.local ", 80);
        assert_eq!(ep.url(), "ws://station-3.local:80");
    }

    #[test]
    fn test_same_target() {
        let a = EndpointDescriptor::new("A", "10.0.0.1", 9000);
        let b = EndpointDescriptor::new("A", "10.0.0.2", 9000);
        let c = EndpointDescriptor::new("other", "10.0.0.1", 9000);
        assert!(!a.same_target(&b));
        assert!(a.same_target(&c));
    }

    #[test]
    fn test_validate() {
        assert!(EndpointDescriptor::new("A", "10.0.0.1", 9000).validate().is_ok());
        assert!(EndpointDescriptor::new("A", "::1", 9000).validate().is_ok());
        assert!(EndpointDescriptor::new("A", "localhost", 9000).validate().is_ok());

        for bad in [
            EndpointDescriptor::new("", "10.0.0.1", 9000),
            EndpointDescriptor::new("A", "", 9000),
            EndpointDescriptor::new("A", "10.0.0.1", 0),
            EndpointDescriptor::new("A", "ws://10.0.0.1", 9000),
            EndpointDescriptor::new("A", "bad host", 9000),
        ] {
            assert!(
                matches!(bad.validate(), Err(Error::InvalidEndpoint { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_deserialize_station_aliases() {
        let json = r#"[{"name":"north","ip":"10.0.0.7","port":9000},
                       {"id":"south","address":"10.0.0.8","port":9001}]"#;
        let list: Vec<EndpointDescriptor> = serde_json::from_str(json).unwrap();
        assert_eq!(list[0], EndpointDescriptor::new("north", "10.0.0.7", 9000));
        assert_eq!(list[1].id.as_str(), "south");
        assert_eq!(list[1].port, 9001);
    }
}
