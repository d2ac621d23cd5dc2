//! Finds the display on the LAN.
//!
//! Order of preference: the address already in use, then the cache file, then a scan
//! of the local /24. Only addresses that came out of a scan are written back to the
//! cache; a known or cached address that still verifies is left alone.
//!
//! A cancelled token stops resolution between probes; the probe in flight finishes.

use std::net::IpAddr;
use std::sync::Arc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use crate::bounded::{bounded, bounded_check};
use crate::cache::AddressCache;
use crate::capabilities::{
    HostAddress, HostnameLookup, IdentityProbe, LivenessProbe, NetworkScanner, ScanOutcome,
};
use crate::config::Timeouts;
use crate::net::SubnetPrefix;

/// Where a resolved address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The caller's address still answers as the device
    Known,
    Cache,
    /// Scan candidate that passed the identity probe
    Scan,
    /// First scan candidate, taken after none passed the identity probe
    ScanUnverified,
    /// Found by the liveness sweep used when the scanner is unavailable
    Sweep,
}

impl ResolutionSource {
    pub fn is_scan_derived(&self) -> bool {
        matches!(self, Self::Scan | Self::ScanUnverified | Self::Sweep)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub address: IpAddr,
    pub source: ResolutionSource,
}

/// Collaborators used to locate and confirm the device
#[derive(Clone)]
pub struct DiscoveryTools {
    pub scanner: Arc<dyn NetworkScanner>,
    pub liveness: Arc<dyn LivenessProbe>,
    pub identity: Arc<dyn IdentityProbe>,
    pub hostnames: Arc<dyn HostnameLookup>,
    pub host: Arc<dyn HostAddress>,
}

pub struct DeviceResolver {
    tools: DiscoveryTools,
    cache: AddressCache,
    hostname: String,
    timeouts: Timeouts,
    sweep_concurrency: usize,
}

impl DeviceResolver {
    pub fn new(
        tools: DiscoveryTools,
        cache: AddressCache,
        hostname: impl Into<String>,
        timeouts: Timeouts,
        sweep_concurrency: usize,
    ) -> Self {
        Self {
            tools,
            cache,
            hostname: hostname.into(),
            timeouts,
            sweep_concurrency: sweep_concurrency.max(1),
        }
    }

    /// Produce a device address, stopping at the first source that works
    pub async fn resolve(&self, known: Option<IpAddr>, cancel: &CancellationToken) -> Option<Resolution> {
        if let Some(addr) = known {
            if self.verify(addr).await {
                return Some(Resolution { address: addr, source: ResolutionSource::Known });
            }
            tracing::info!("Known address {} failed verification", addr);
        }

        if cancel.is_cancelled() {
            return None;
        }
        if let Some(record) = self.cache.load() {
            tracing::info!("Trying cached address {}", record.address);
            if self.verify(record.address).await {
                tracing::info!("Cached address {} verified successfully", record.address);
                return Some(Resolution { address: record.address, source: ResolutionSource::Cache });
            }
            tracing::info!("Cached address verification failed, will scan network");
        }

        if cancel.is_cancelled() {
            return None;
        }
        let resolution = self.discover(cancel).await?;
        if resolution.source.is_scan_derived() {
            self.cache.save(resolution.address, &self.hostname);
        }
        Some(resolution)
    }

    /// Ping, then confirm identity. Both must pass.
    pub async fn verify(&self, addr: IpAddr) -> bool {
        let alive = bounded_check("Ping", self.timeouts.ping, self.tools.liveness.is_alive(addr)).await;
        if !alive {
            tracing::debug!("Address {} not responding to ping", addr);
            return false;
        }
        self.identify(addr).await
    }

    async fn identify(&self, addr: IpAddr) -> bool {
        bounded_check(
            "Identity probe",
            self.timeouts.identity,
            self.tools.identity.check(addr),
        )
        .await
    }

    async fn discover(&self, cancel: &CancellationToken) -> Option<Resolution> {
        let Some(local) = self.tools.host.outbound_ipv4() else {
            tracing::error!("Could not determine network range");
            return None;
        };
        let subnet = SubnetPrefix::containing(local);

        tracing::info!(
            "Scanning {}.0/24 for the display using {}",
            subnet,
            self.tools.scanner.name()
        );
        let outcome = bounded("Network scan", self.timeouts.scan, self.tools.scanner.scan(subnet))
            .await
            .unwrap_or(ScanOutcome::Candidates(Vec::new()));

        match outcome {
            ScanOutcome::Candidates(candidates) => self.pick_candidate(&candidates, cancel).await,
            ScanOutcome::Unavailable => {
                tracing::warn!(
                    "{} not available, trying liveness sweep",
                    self.tools.scanner.name()
                );
                self.sweep(subnet, cancel).await
            }
        }
    }

    async fn pick_candidate(&self, candidates: &[IpAddr], cancel: &CancellationToken) -> Option<Resolution> {
        let Some(&first) = candidates.first() else {
            tracing::warn!("No devices with cast ports found");
            return None;
        };
        tracing::info!("Found {} candidate(s): {:?}", candidates.len(), candidates);

        for &addr in candidates {
            if cancel.is_cancelled() {
                tracing::info!("Candidate verification interrupted by shutdown");
                return None;
            }
            if self.identify(addr).await {
                tracing::info!("Found verified display at {}", addr);
                return Some(Resolution { address: addr, source: ResolutionSource::Scan });
            }
        }

        tracing::info!("Using first candidate {} (identity verification failed)", first);
        Some(Resolution { address: first, source: ResolutionSource::ScanUnverified })
    }

    /// Ping every host in the range, then look for the display among responders
    async fn sweep(&self, subnet: SubnetPrefix, cancel: &CancellationToken) -> Option<Resolution> {
        let liveness = &self.tools.liveness;
        let ping_timeout = self.timeouts.ping;

        let responders: Vec<IpAddr> = stream::iter(subnet.hosts().map(IpAddr::V4))
            .map(|addr| async move {
                let alive = bounded_check("Ping", ping_timeout, liveness.is_alive(addr)).await;
                (addr, alive)
            })
            .buffered(self.sweep_concurrency)
            .take_until(cancel.cancelled())
            .filter_map(|(addr, alive)| async move { alive.then_some(addr) })
            .collect()
            .await;

        tracing::info!("Liveness sweep found {} responding host(s)", responders.len());

        for addr in responders {
            if cancel.is_cancelled() {
                tracing::info!("Liveness sweep interrupted by shutdown");
                return None;
            }
            if self.matches_device(addr).await {
                tracing::info!("Found display at {}", addr);
                return Some(Resolution { address: addr, source: ResolutionSource::Sweep });
            }
        }

        tracing::warn!("Display not found by liveness sweep");
        None
    }

    /// Hostname match when reverse lookup answers, identity probe otherwise
    async fn matches_device(&self, addr: IpAddr) -> bool {
        let name = bounded(
            "Reverse lookup",
            self.timeouts.lookup,
            self.tools.hostnames.reverse(addr),
        )
        .await
        .flatten();

        match name {
            Some(name) => name.to_lowercase().contains(&self.hostname.to_lowercase()),
            None => self.identify(addr).await,
        }
    }
}
