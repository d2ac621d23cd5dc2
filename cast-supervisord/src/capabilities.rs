//! Interfaces the supervision core drives.
//!
//! Everything that touches the network, a subprocess or the container runtime sits
//! behind one of these traits. The resolver and supervisor only see the traits; the
//! concrete adapters are chosen in `main` and replaced by fakes in tests.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use anyhow::Result;
use async_trait::async_trait;
use crate::net::SubnetPrefix;

/// Result of asking a scanner for candidate devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Hosts advertising the discovery ports, in scan order (possibly empty)
    Candidates(Vec<IpAddr>),
    /// The scanning tool itself could not be run
    Unavailable,
}

#[async_trait]
pub trait NetworkScanner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, subnet: SubnetPrefix) -> ScanOutcome;
}

/// Coarse reachability test, e.g. a single ICMP echo
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, addr: IpAddr) -> bool;
}

/// Confirms the host at an address runs the display's software
#[async_trait]
pub trait IdentityProbe: Send + Sync {
    async fn check(&self, addr: IpAddr) -> bool;
}

/// Textual status dump of the receiver; `None` on any failure
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn snapshot(&self, addr: IpAddr) -> Option<String>;
}

#[async_trait]
pub trait CastTrigger: Send + Sync {
    /// Returns true when the cast command reported success
    async fn cast(&self, addr: IpAddr, url: &str) -> bool;
}

/// Lifecycle of the local server publishing the content
#[async_trait]
pub trait ContentEndpoint: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails when the runtime needed to serve content is missing
    async fn check_available(&self) -> Result<()>;

    /// Idempotent: true if already running or started now
    async fn ensure_running(&self, port: u16, content_dir: &Path) -> bool;

    /// Best-effort teardown of anything this endpoint started
    async fn cleanup(&self);
}

#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn is_healthy(&self, url: &str) -> bool;
}

#[async_trait]
pub trait HostnameLookup: Send + Sync {
    async fn reverse(&self, addr: IpAddr) -> Option<String>;
}

/// Source of this host's own LAN address
pub trait HostAddress: Send + Sync {
    fn outbound_ipv4(&self) -> Option<Ipv4Addr>;
}
