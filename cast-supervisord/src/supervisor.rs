//! The supervision loop.
//!
//! Each cycle derives the situation from fresh signals instead of a stored state enum:
//!
//! - no address: resolve one (known → cache → scan)
//! - healthy: endpoint answers, display shows our receiver, re-verification not due;
//!   nothing else is called
//! - degraded: a signal is false or re-verification is due; re-verify the address,
//!   drop it on failure, otherwise make sure the endpoint runs and recast if needed
//!
//! Casting only ever happens after the address was verified or resolved in the same
//! cycle, and every cycle ends in a bounded pause. Once shutdown is requested no new
//! action starts; the cycle returns after the call in flight.

use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::bounded::bounded;
use crate::capabilities::{CastTrigger, ContentEndpoint, HostAddress};
use crate::config::{Config, Timeouts};
use crate::health::{HealthChecks, HealthSnapshot};
use crate::net::endpoint_url;
use crate::resolver::DeviceResolver;

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub port: u16,
    pub content_dir: PathBuf,
    pub interval: Duration,
    pub reverify_interval: Duration,
    pub retry_delay: Duration,
    pub timeouts: Timeouts,
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.endpoint.port,
            content_dir: config.endpoint.content_dir.clone(),
            interval: config.supervisor.interval(),
            reverify_interval: config.supervisor.reverify_interval(),
            retry_delay: config.supervisor.retry_delay(),
            timeouts: Timeouts::from(&config.timeouts),
        }
    }
}

/// Collaborators the supervisor acts through
#[derive(Clone)]
pub struct Actuators {
    pub endpoint: Arc<dyn ContentEndpoint>,
    pub cast: Arc<dyn CastTrigger>,
    pub host: Arc<dyn HostAddress>,
}

/// Mutable facts carried between cycles
#[derive(Debug, Clone, Default)]
pub struct SupervisorState {
    pub known_address: Option<IpAddr>,
    pub last_verified_at: Option<Instant>,
    pub last_cast_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastAttempt {
    NotNeeded,
    Succeeded,
    Failed,
}

/// How a cycle ended; decides the pause before the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Healthy,
    NoDevice,
    /// Re-verification failed and the address was dropped
    AddressLost,
    NoLocalAddress,
    EndpointFailed,
    Supervised(CastAttempt),
    /// The cycle panicked and was abandoned
    Aborted,
    /// Shutdown was requested mid-cycle
    Cancelled,
}

pub struct Supervisor {
    settings: SupervisorSettings,
    resolver: DeviceResolver,
    health: HealthChecks,
    actuators: Actuators,
    state: SupervisorState,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        settings: SupervisorSettings,
        resolver: DeviceResolver,
        health: HealthChecks,
        actuators: Actuators,
    ) -> Self {
        Self {
            settings,
            resolver,
            health,
            actuators,
            state: SupervisorState::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Startup checks: the endpoint runtime must exist, leftovers are cleared
    pub async fn prepare(&self) -> Result<()> {
        let endpoint = &self.actuators.endpoint;
        endpoint
            .check_available()
            .await
            .with_context(|| format!("{} endpoint runtime is not available", endpoint.name()))?;
        endpoint.cleanup().await;
        Ok(())
    }

    /// Run cycles until `cancel` fires, then tear down the endpoint
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!("Supervision loop started");
        self.cancel = cancel.clone();

        while !cancel.is_cancelled() {
            let outcome = self.guarded_cycle().await;
            let pause = self.pause_after(outcome);
            tracing::debug!("Cycle ended {:?}, next in {:?}", outcome, pause);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Supervision loop stopping");
        self.actuators.endpoint.cleanup().await;
    }

    /// One cycle, with a panic anywhere inside it contained to that cycle
    pub async fn guarded_cycle(&mut self) -> CycleOutcome {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Unexpected error in supervision cycle: {}", reason);
                CycleOutcome::Aborted
            }
        }
    }

    pub fn pause_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::AddressLost => self.settings.retry_delay,
            _ => self.settings.interval,
        }
    }

    /// True once shutdown was requested; the next action is skipped
    fn stopping(&self, action: &str) -> bool {
        let stopping = self.cancel.is_cancelled();
        if stopping {
            tracing::info!("Shutdown requested, not starting {}", action);
        }
        stopping
    }

    fn reverify_due(&self, now: Instant) -> bool {
        self.state
            .last_verified_at
            .map_or(true, |at| now.duration_since(at) >= self.settings.reverify_interval)
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let self_address = self.actuators.host.outbound_ipv4();
        let port = self.settings.port;

        let health = match self.state.known_address {
            Some(device) => {
                let snapshot = self.health.snapshot(self_address, port, device).await;
                let reverify_due = self.reverify_due(Instant::now());
                if snapshot.is_healthy() && !reverify_due {
                    tracing::debug!("All systems healthy - no action needed");
                    return CycleOutcome::Healthy;
                }
                log_degraded(&snapshot, reverify_due);
                Some(snapshot)
            }
            None => None,
        };

        if self.stopping("address check") {
            return CycleOutcome::Cancelled;
        }

        let device = match self.state.known_address {
            Some(device) => {
                if !self.resolver.verify(device).await {
                    tracing::info!("Address verification failed for {} - device may have moved", device);
                    self.state.known_address = None;
                    self.state.last_verified_at = None;
                    return CycleOutcome::AddressLost;
                }
                device
            }
            None => {
                tracing::info!("No device address - resolving");
                let Some(resolution) = self.resolver.resolve(None, &self.cancel).await else {
                    if self.stopping("device resolution") {
                        return CycleOutcome::Cancelled;
                    }
                    tracing::warn!("Display not found on network");
                    return CycleOutcome::NoDevice;
                };
                tracing::info!(
                    "Display address {} ({:?})",
                    resolution.address,
                    resolution.source
                );
                resolution.address
            }
        };
        self.state.known_address = Some(device);
        self.state.last_verified_at = Some(Instant::now());

        let Some(local) = self_address else {
            tracing::error!("Cannot determine local address for the endpoint");
            return CycleOutcome::NoLocalAddress;
        };

        let endpoint_healthy = health.map_or(false, |h| h.endpoint_healthy);
        if !endpoint_healthy && self.stopping("endpoint start") {
            return CycleOutcome::Cancelled;
        }
        if !endpoint_healthy && !self.ensure_endpoint().await {
            tracing::error!("Failed to start content endpoint");
            return CycleOutcome::EndpointFailed;
        }

        let showing = health.map_or(false, |h| h.display_showing_content);
        if showing && self.state.last_cast_at.is_some() {
            return CycleOutcome::Supervised(CastAttempt::NotNeeded);
        }

        if self.stopping("cast") {
            return CycleOutcome::Cancelled;
        }
        if self.state.last_cast_at.is_none() {
            tracing::info!("Performing initial cast...");
        } else {
            tracing::info!("Recasting due to status issue...");
        }
        CycleOutcome::Supervised(self.cast(device, &endpoint_url(local, port)).await)
    }

    async fn ensure_endpoint(&self) -> bool {
        let endpoint = &self.actuators.endpoint;
        bounded(
            "Endpoint start",
            self.settings.timeouts.endpoint_start,
            endpoint.ensure_running(self.settings.port, &self.settings.content_dir),
        )
        .await
        .unwrap_or(false)
    }

    async fn cast(&mut self, device: IpAddr, url: &str) -> CastAttempt {
        let ok = bounded("Cast", self.settings.timeouts.cast, self.actuators.cast.cast(device, url))
            .await
            .unwrap_or(false);

        if ok {
            self.state.last_cast_at = Some(Instant::now());
            tracing::info!("Cast initiated on {}", device);
            CastAttempt::Succeeded
        } else {
            tracing::error!("Failed to cast, will retry next cycle");
            CastAttempt::Failed
        }
    }
}

fn log_degraded(snapshot: &HealthSnapshot, reverify_due: bool) {
    if !snapshot.endpoint_healthy {
        tracing::info!("Content endpoint issue detected");
    }
    if !snapshot.display_showing_content {
        tracing::info!("Cast status issue detected");
    }
    if snapshot.is_healthy() && reverify_due {
        tracing::debug!("Periodic address verification...");
    }
}
