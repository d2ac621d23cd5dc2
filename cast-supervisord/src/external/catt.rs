//! Identity, status and casting through the `catt` command line tool.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use crate::capabilities::{CastTrigger, IdentityProbe, StatusProbe};
use crate::config::Timeouts;
use super::command::{self, CommandOutput};

pub struct CattClient {
    binary: PathBuf,
    indicators: Vec<String>,
    identity_timeout: Duration,
    status_timeout: Duration,
    cast_timeout: Duration,
}

impl CattClient {
    pub fn new(binary: PathBuf, indicators: &[String], timeouts: &Timeouts) -> Self {
        Self {
            binary,
            indicators: indicators.iter().map(|i| i.to_lowercase()).collect(),
            identity_timeout: timeouts.identity,
            status_timeout: timeouts.status,
            cast_timeout: timeouts.cast,
        }
    }

    async fn device_command(
        &self,
        addr: IpAddr,
        action: &[&str],
        limit: Duration,
    ) -> anyhow::Result<CommandOutput> {
        let mut args = vec!["-d".to_string(), addr.to_string()];
        args.extend(action.iter().map(|a| a.to_string()));
        command::run(&self.binary, &args, limit).await
    }
}

/// True when any indicator appears in the status text, case-insensitively
pub fn matches_identity(status: &str, indicators: &[String]) -> bool {
    let status = status.to_lowercase();
    indicators.iter().any(|i| status.contains(&i.to_lowercase()))
}

#[async_trait]
impl IdentityProbe for CattClient {
    async fn check(&self, addr: IpAddr) -> bool {
        match self.device_command(addr, &["status"], self.identity_timeout).await {
            Ok(out) if out.success => {
                let found = matches_identity(&out.stdout, &self.indicators);
                if found {
                    tracing::info!("Found cast device at {}: {}", addr, out.stdout.trim());
                }
                found
            }
            Ok(out) => {
                tracing::debug!("catt status for {} failed: {}", addr, out.summary());
                false
            }
            Err(e) => {
                tracing::debug!("Cast device check failed for {}: {:#}", addr, e);
                false
            }
        }
    }
}

#[async_trait]
impl StatusProbe for CattClient {
    async fn snapshot(&self, addr: IpAddr) -> Option<String> {
        match self.device_command(addr, &["info"], self.status_timeout).await {
            Ok(out) if out.success => {
                tracing::debug!("Device info: {}", out.stdout.trim());
                Some(out.stdout)
            }
            Ok(out) => {
                tracing::warn!("Failed to get device info: {}", out.summary());
                None
            }
            Err(e) => {
                tracing::warn!("Device info for {} failed: {:#}", addr, e);
                None
            }
        }
    }
}

#[async_trait]
impl CastTrigger for CattClient {
    async fn cast(&self, addr: IpAddr, url: &str) -> bool {
        tracing::info!("Casting {} to {}...", url, addr);
        match self.device_command(addr, &["cast_site", url], self.cast_timeout).await {
            Ok(out) if out.success => {
                tracing::info!("Cast initiated: {}", out.stdout.trim());
                true
            }
            Ok(out) => {
                tracing::error!("Casting failed: {}", out.summary());
                false
            }
            Err(e) => {
                tracing::error!("Casting error: {:#}", e);
                false
            }
        }
    }
}
