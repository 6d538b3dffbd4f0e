//! One-shot connection probe
//!
//! Opens a socket outside the registry, writes the handshake, closes, and
//! reports how long the connect took. Probes never retry and emit no events.

use std::time::{Duration, Instant};

use futures_util::SinkExt;

use crate::connection::{close_socket, open_socket};
use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::Error;
use crate::handshake::SubscriptionHandshake;

/// Default probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const PROBE_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of probing one endpoint
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub endpoint: EndpointId,
    pub url: String,
    /// Time until the connect completed or failed
    pub duration: Duration,
    /// Why the probe failed, if it did
    pub error: Option<Error>,
}

impl ProbeReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

impl std::fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "{}: connected in {}ms", self.endpoint, self.duration.as_millis()),
            Some(e) => write!(f, "{}: failed after {}ms: {}", self.endpoint, self.duration.as_millis(), e),
        }
    }
}

/// Connect once, send the handshake, and close
pub async fn probe(
    descriptor: &EndpointDescriptor,
    handshake: &dyn SubscriptionHandshake,
    timeout: Duration,
) -> ProbeReport {
    let url = descriptor.url();
    let endpoint = descriptor.id.clone();
    let started = Instant::now();

    let report = |error: Option<Error>, duration: Duration| ProbeReport {
        endpoint: endpoint.clone(),
        url: url.clone(),
        duration,
        error,
    };

    if let Err(e) = descriptor.validate() {
        return report(Some(e), Duration::ZERO);
    }

    tracing::debug!(endpoint = %endpoint, url = %url, "Probing endpoint");

    let mut ws = match open_socket(&url, timeout, true).await {
        Ok(ws) => ws,
        Err(reason) => {
            let duration = started.elapsed();
            tracing::warn!(endpoint = %endpoint, error = %reason, "Probe failed");
            return report(
                Some(Error::ConnectFailed {
                    endpoint: endpoint.clone(),
                    reason,
                }),
                duration,
            );
        }
    };
    let duration = started.elapsed();

    let message = handshake.message(&endpoint).into_message();
    let error = ws
        .send(message)
        .await
        .err()
        .map(|e| Error::HandshakeSendFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        });
    close_socket(&mut ws, PROBE_CLOSE_TIMEOUT).await;

    tracing::info!(
        endpoint = %endpoint,
        duration_ms = duration.as_millis() as u64,
        ok = error.is_none(),
        "Probe finished"
    );

    report(error, duration)
}

/// Probe several endpoints one after another
pub async fn probe_all(
    descriptors: &[EndpointDescriptor],
    handshake: &dyn SubscriptionHandshake,
    timeout: Duration,
) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        reports.push(probe(descriptor, handshake, timeout).await);
    }

    let ok = reports.iter().filter(|r| r.success()).count();
    tracing::info!(ok, failed = reports.len() - ok, "Probe batch finished");
    reports
}
