use std::net::IpAddr;
use std::time::Duration;
use async_trait::async_trait;
use crate::capabilities::HostnameLookup;
use super::command;

/// Reverse lookup through `getent hosts`, so /etc/hosts and the system resolver both count
pub struct GetentLookup {
    limit: Duration,
}

impl GetentLookup {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl HostnameLookup for GetentLookup {
    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        let out = command::run("getent", &["hosts".to_string(), addr.to_string()], self.limit)
            .await
            .map_err(|e| tracing::debug!("Reverse lookup of {} failed: {:#}", addr, e))
            .ok()?;
        if !out.success {
            return None;
        }
        parse_hosts_line(&out.stdout)
    }
}

/// Names from the first `getent hosts` line, joined by spaces; `None` when there are none
fn parse_hosts_line(stdout: &str) -> Option<String> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let names: Vec<&str> = line.split_whitespace().skip(1).collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(" "))
    }
}
