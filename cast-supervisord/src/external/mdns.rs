use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use shared::protocol::{CAST_DISCOVERY_PORTS, GOOGLECAST_SERVICE_TYPE};
use crate::capabilities::{NetworkScanner, ScanOutcome};
use crate::net::SubnetPrefix;

/// Listens for `_googlecast._tcp` announcements for a fixed window
pub struct MdnsScanner {
    window: Duration,
}

impl MdnsScanner {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    async fn collect(&self, daemon: &ServiceDaemon, subnet: SubnetPrefix) -> ScanOutcome {
        let receiver = match daemon.browse(GOOGLECAST_SERVICE_TYPE) {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::warn!("Failed to browse {}: {}", GOOGLECAST_SERVICE_TYPE, e);
                return ScanOutcome::Unavailable;
            }
        };

        let mut found = Vec::new();
        let deadline = tokio::time::sleep(self.window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = receiver.recv_async() => match event {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        tracing::debug!("Resolved service: {}", info.get_fullname());
                        let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
                        merge_announcement(&mut found, &addresses, info.get_port(), subnet);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("mDNS receiver disconnected: {}", e);
                        break;
                    }
                },
                _ = &mut deadline => break,
            }
        }

        if let Err(e) = daemon.stop_browse(GOOGLECAST_SERVICE_TYPE) {
            tracing::debug!("Failed to stop browse: {}", e);
        }
        ScanOutcome::Candidates(found)
    }
}

/// Append the in-subnet addresses of one announcement, keeping first-seen order
fn merge_announcement(found: &mut Vec<IpAddr>, addresses: &[IpAddr], port: u16, subnet: SubnetPrefix) {
    if !CAST_DISCOVERY_PORTS.contains(&port) {
        return;
    }
    let seen: HashSet<IpAddr> = found.iter().copied().collect();
    let mut fresh: Vec<IpAddr> = addresses
        .iter()
        .copied()
        .filter(|a| subnet.contains(a) && !seen.contains(a))
        .collect();
    fresh.sort();
    fresh.dedup();
    found.extend(fresh);
}

#[async_trait]
impl NetworkScanner for MdnsScanner {
    fn name(&self) -> &'static str {
        "mdns"
    }

    async fn scan(&self, subnet: SubnetPrefix) -> ScanOutcome {
        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(e) => {
                tracing::warn!("Failed to create mDNS daemon: {}", e);
                return ScanOutcome::Unavailable;
            }
        };

        let outcome = self.collect(&daemon, subnet).await;

        if let Err(e) = daemon.shutdown() {
            tracing::debug!("Failed to shutdown mDNS daemon: {}", e);
        }
        outcome
    }
}
