//! Per-cycle health signals.
//!
//! Both checks answer with a plain bool: any error, timeout or unexpected answer is
//! simply "not healthy" and never propagates.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use crate::bounded::{bounded, bounded_check};
use crate::capabilities::{EndpointProbe, StatusProbe};
use crate::net::endpoint_url;

/// Signals gathered fresh every cycle that has a device address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub endpoint_healthy: bool,
    pub display_showing_content: bool,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.endpoint_healthy && self.display_showing_content
    }
}

pub struct HealthChecks {
    endpoint_probe: Arc<dyn EndpointProbe>,
    status_probe: Arc<dyn StatusProbe>,
    active_markers: Vec<String>,
    endpoint_timeout: Duration,
    status_timeout: Duration,
}

impl HealthChecks {
    pub fn new(
        endpoint_probe: Arc<dyn EndpointProbe>,
        status_probe: Arc<dyn StatusProbe>,
        active_markers: &[String],
        endpoint_timeout: Duration,
        status_timeout: Duration,
    ) -> Self {
        Self {
            endpoint_probe,
            status_probe,
            active_markers: active_markers.iter().map(|m| m.to_lowercase()).collect(),
            endpoint_timeout,
            status_timeout,
        }
    }

    /// Single request to `http://self_address:port/`; a missing local address is unhealthy
    pub async fn is_endpoint_healthy(&self, self_address: Option<Ipv4Addr>, port: u16) -> bool {
        let Some(host) = self_address else {
            return false;
        };
        let url = endpoint_url(host, port);
        let healthy = bounded_check(
            "Endpoint health check",
            self.endpoint_timeout,
            self.endpoint_probe.is_healthy(&url),
        )
        .await;

        if !healthy {
            tracing::debug!("Endpoint {} not healthy", url);
        }
        healthy
    }

    /// Classify one status snapshot of the device; no retries
    pub async fn is_display_showing_content(&self, device: IpAddr) -> bool {
        let snapshot = bounded(
            "Device status snapshot",
            self.status_timeout,
            self.status_probe.snapshot(device),
        )
        .await
        .flatten();

        match snapshot {
            Some(text) => {
                tracing::debug!("Device info: {}", text.trim());
                let active = shows_content(&text, &self.active_markers);
                if !active {
                    tracing::debug!("No content receiver active on {}", device);
                }
                active
            }
            None => {
                tracing::info!("No status snapshot from {}", device);
                false
            }
        }
    }

    pub async fn snapshot(
        &self,
        self_address: Option<Ipv4Addr>,
        port: u16,
        device: IpAddr,
    ) -> HealthSnapshot {
        HealthSnapshot {
            endpoint_healthy: self.is_endpoint_healthy(self_address, port).await,
            display_showing_content: self.is_display_showing_content(device).await,
        }
    }
}

/// True when the status text names the web receiver app or reports it ready.
///
/// Any active DashCast session is taken to be ours; the receiver does not report
/// which URL it is rendering.
pub fn shows_content(status: &str, markers: &[String]) -> bool {
    let status = status.to_lowercase();
    markers.iter().any(|marker| status.contains(marker.as_str()))
}
