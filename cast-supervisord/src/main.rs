mod bounded;
mod cache;
mod capabilities;
mod config;
mod endpoint;
mod external;
mod health;
mod net;
mod resolver;
mod supervisor;
#[cfg(test)]
mod testing;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use crate::cache::AddressCache;
use crate::capabilities::{HostAddress, NetworkScanner};
use crate::config::{Config, ScanStrategy, Timeouts};
use crate::external::{
    command, CattClient, GetentLookup, HttpEndpointProbe, MdnsScanner, NmapScanner, PingProbe,
};
use crate::health::HealthChecks;
use crate::net::RoutedHostAddress;
use crate::resolver::{DeviceResolver, DiscoveryTools};
use crate::supervisor::{Actuators, Supervisor, SupervisorSettings};

const DEFAULT_CONFIG_PATH: &str = "/etc/cast-supervisor/supervisord.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load_or_default(&config_path)?;
    init_logging(config.log.file.as_deref())?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!("Starting cast-supervisord on {}", host);
    tracing::info!("Using config {}", config_path);

    let mut supervisor = build_supervisor(&config)?;
    supervisor.prepare().await?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    supervisor.run(cancel).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_logging(file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cast_supervisord=info"));

    let file_layer = match file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn build_supervisor(config: &Config) -> Result<Supervisor> {
    let timeouts = Timeouts::from(&config.timeouts);
    let host: Arc<dyn HostAddress> = Arc::new(RoutedHostAddress::new(config.endpoint.advertise_address));

    let catt_binary = command::resolve_user_binary("catt").unwrap_or_else(|| {
        tracing::warn!("catt not found on PATH or in ~/.local/bin; device probes will fail");
        "catt".into()
    });
    let catt = Arc::new(CattClient::new(
        catt_binary,
        &config.device.identity_indicators,
        &timeouts,
    ));

    let scanner: Arc<dyn NetworkScanner> = match config.scan.strategy {
        ScanStrategy::Nmap => Arc::new(NmapScanner::new(
            config.scan.vendor_filter().map(str::to_string),
            timeouts.scan,
        )),
        ScanStrategy::Mdns => Arc::new(MdnsScanner::new(Duration::from_secs(config.scan.mdns_window_secs))),
    };

    let tools = DiscoveryTools {
        scanner,
        liveness: Arc::new(PingProbe::new(timeouts.ping)),
        identity: catt.clone(),
        hostnames: Arc::new(GetentLookup::new(timeouts.lookup)),
        host: host.clone(),
    };
    let cache = AddressCache::new(
        config.cache.path.clone(),
        Duration::from_secs(config.cache.max_age_secs),
    );
    tracing::info!("Address cache at {}", cache.path().display());
    let resolver = DeviceResolver::new(
        tools,
        cache,
        config.device.hostname.clone(),
        timeouts,
        config.scan.sweep_concurrency,
    );

    let health = HealthChecks::new(
        Arc::new(HttpEndpointProbe::new(timeouts.endpoint_health)?),
        catt.clone(),
        &config.device.active_markers,
        timeouts.endpoint_health,
        timeouts.status,
    );

    let endpoint = endpoint::from_config(&config.endpoint, &timeouts);
    tracing::info!(
        "Content endpoint: {} on port {}",
        endpoint.name(),
        config.endpoint.port
    );

    let actuators = Actuators { endpoint, cast: catt, host };
    Ok(Supervisor::new(
        SupervisorSettings::from_config(config),
        resolver,
        health,
        actuators,
    ))
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
