use std::net::IpAddr;
use std::time::Duration;
use async_trait::async_trait;
use shared::protocol::CAST_DISCOVERY_PORTS;
use crate::capabilities::{NetworkScanner, ScanOutcome};
use crate::net::SubnetPrefix;
use super::command;

/// Port scan of the /24 for hosts with an open discovery port
pub struct NmapScanner {
    vendor_filter: Option<String>,
    limit: Duration,
}

impl NmapScanner {
    pub fn new(vendor_filter: Option<String>, limit: Duration) -> Self {
        Self { vendor_filter, limit }
    }

    fn args(subnet: SubnetPrefix) -> Vec<String> {
        let ports = CAST_DISCOVERY_PORTS
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        vec![
            "-Pn".to_string(),
            "-p".to_string(),
            ports,
            "--open".to_string(),
            subnet.nmap_range(),
        ]
    }
}

#[async_trait]
impl NetworkScanner for NmapScanner {
    fn name(&self) -> &'static str {
        "nmap"
    }

    async fn scan(&self, subnet: SubnetPrefix) -> ScanOutcome {
        if !command::command_exists("nmap") {
            return ScanOutcome::Unavailable;
        }

        let out = match command::run("nmap", &Self::args(subnet), self.limit).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("Network scan failed: {:#}", e);
                return ScanOutcome::Candidates(Vec::new());
            }
        };
        if !out.success {
            tracing::warn!("nmap exited with {:?}: {}", out.code, out.summary());
            return ScanOutcome::Unavailable;
        }

        let found = parse_nmap_output(&out.stdout, &CAST_DISCOVERY_PORTS, self.vendor_filter.as_deref());
        ScanOutcome::Candidates(found.into_iter().filter(|a| subnet.contains(a)).collect())
    }
}

#[derive(Default)]
struct HostReport {
    address: Option<IpAddr>,
    port_open: bool,
    vendor_match: bool,
}

impl HostReport {
    fn accepted(&self) -> Option<IpAddr> {
        self.address.filter(|_| self.port_open && self.vendor_match)
    }
}

/// Hosts in report order with one of `ports` open and, when a filter is set,
/// a `MAC Address:` line naming that vendor
pub fn parse_nmap_output(text: &str, ports: &[u16], vendor_filter: Option<&str>) -> Vec<IpAddr> {
    let open_markers: Vec<String> = ports.iter().map(|p| format!("{}/tcp open", p)).collect();
    let mut found = Vec::new();
    let mut current = HostReport::default();

    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Nmap scan report for") {
            found.extend(current.accepted());
            let address = rest
                .split_whitespace()
                .last()
                .map(|t| t.trim_matches(|c| c == '(' || c == ')'))
                .and_then(|t| t.parse().ok());
            current = HostReport {
                address,
                port_open: false,
                vendor_match: vendor_filter.is_none(),
            };
        } else if current.address.is_none() {
            continue;
        } else if open_markers.iter().any(|m| line.starts_with(m.as_str())) {
            current.port_open = true;
        } else if line.starts_with("MAC Address:") {
            if let Some(vendor) = vendor_filter {
                if line.contains(vendor) {
                    tracing::debug!("Vendor match at {:?}: {}", current.address, line);
                    current.vendor_match = true;
                }
            }
        }
    }
    found.extend(current.accepted());
    found
}
