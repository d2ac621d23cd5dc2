use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{
    DASHCAST_APP_ID, DASHCAST_DISPLAY_NAME, DEFAULT_DEVICE_HOSTNAME, DEFAULT_ENDPOINT_PORT,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Case-insensitive substrings of `catt status` output that identify the display
    #[serde(default = "default_identity_indicators")]
    pub identity_indicators: Vec<String>,
    /// Case-insensitive substrings of `catt info` output meaning our receiver is active
    #[serde(default = "default_active_markers")]
    pub active_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRuntime {
    /// Static file server running inside this process
    Embedded,
    /// httpd container managed through the docker CLI
    Docker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_runtime")]
    pub runtime: EndpointRuntime,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Address advertised to the display; detected from the default route when unset
    #[serde(default)]
    pub advertise_address: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    Nmap,
    Mdns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ScanStrategy,
    /// Only keep nmap hosts whose MAC vendor contains this string; empty disables it
    #[serde(default = "default_vendor_filter")]
    pub vendor_filter: Option<String>,
    #[serde(default = "default_mdns_window")]
    pub mdns_window_secs: u64,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_reverify_interval")]
    pub reverify_interval_secs: u64,
    /// Pause after losing the device address, shorter than a full cycle
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_ping_timeout")]
    pub ping_secs: u64,
    #[serde(default = "default_identity_timeout")]
    pub identity_secs: u64,
    #[serde(default = "default_status_timeout")]
    pub status_secs: u64,
    #[serde(default = "default_cast_timeout")]
    pub cast_secs: u64,
    #[serde(default = "default_endpoint_health_timeout")]
    pub endpoint_health_secs: u64,
    #[serde(default = "default_endpoint_start_timeout")]
    pub endpoint_start_secs: u64,
    #[serde(default = "default_scan_timeout")]
    pub scan_secs: u64,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Additional plain-text log destination next to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_hostname() -> String {
    DEFAULT_DEVICE_HOSTNAME.to_string()
}

fn default_identity_indicators() -> Vec<String> {
    [
        "nest hub", "google nest", "living room", "display",
        "chromecast", "cast", "backdrop", "idle", "ready",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_active_markers() -> Vec<String> {
    vec![
        format!("display_name: {}", DASHCAST_DISPLAY_NAME.to_lowercase()),
        format!("app_id: {}", DASHCAST_APP_ID),
        "status_text: application ready".to_string(),
    ]
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("/var/lib/cast-supervisor/device_cache.json")
}

fn default_max_age() -> u64 {
    24 * 60 * 60
}

fn default_runtime() -> EndpointRuntime {
    EndpointRuntime::Embedded
}

fn default_port() -> u16 {
    DEFAULT_ENDPOINT_PORT
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("/opt/smart-display/src")
}

fn default_container_name() -> String {
    "smart-display-server".to_string()
}

fn default_image() -> String {
    "httpd:alpine".to_string()
}

fn default_strategy() -> ScanStrategy {
    ScanStrategy::Nmap
}

fn default_vendor_filter() -> Option<String> {
    Some("Google".to_string())
}

fn default_mdns_window() -> u64 {
    5
}

fn default_sweep_concurrency() -> usize {
    32
}

fn default_interval() -> u64 {
    30
}

fn default_reverify_interval() -> u64 {
    600
}

fn default_retry_delay() -> u64 {
    2
}

fn default_ping_timeout() -> u64 {
    2
}

fn default_identity_timeout() -> u64 {
    15
}

fn default_status_timeout() -> u64 {
    10
}

fn default_cast_timeout() -> u64 {
    30
}

fn default_endpoint_health_timeout() -> u64 {
    5
}

fn default_endpoint_start_timeout() -> u64 {
    60
}

fn default_scan_timeout() -> u64 {
    60
}

fn default_lookup_timeout() -> u64 {
    5
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            identity_indicators: default_identity_indicators(),
            active_markers: default_active_markers(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_age_secs: default_max_age(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            port: default_port(),
            content_dir: default_content_dir(),
            container_name: default_container_name(),
            image: default_image(),
            advertise_address: None,
        }
    }
}

impl ScanConfig {
    pub fn vendor_filter(&self) -> Option<&str> {
        self.vendor_filter
            .as_deref()
            .map(str::trim)
            .filter(|vendor| !vendor.is_empty())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            vendor_filter: default_vendor_filter(),
            mdns_window_secs: default_mdns_window(),
            sweep_concurrency: default_sweep_concurrency(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            reverify_interval_secs: default_reverify_interval(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ping_secs: default_ping_timeout(),
            identity_secs: default_identity_timeout(),
            status_secs: default_status_timeout(),
            cast_secs: default_cast_timeout(),
            endpoint_health_secs: default_endpoint_health_timeout(),
            endpoint_start_secs: default_endpoint_start_timeout(),
            scan_secs: default_scan_timeout(),
            lookup_secs: default_lookup_timeout(),
        }
    }
}

impl SupervisorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn reverify_interval(&self) -> Duration {
        Duration::from_secs(self.reverify_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Upper bounds for every call the supervisor makes into a collaborator
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub ping: Duration,
    pub identity: Duration,
    pub status: Duration,
    pub cast: Duration,
    pub endpoint_health: Duration,
    pub endpoint_start: Duration,
    pub scan: Duration,
    pub lookup: Duration,
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(cfg: &TimeoutConfig) -> Self {
        Self {
            ping: Duration::from_secs(cfg.ping_secs),
            identity: Duration::from_secs(cfg.identity_secs),
            status: Duration::from_secs(cfg.status_secs),
            cast: Duration::from_secs(cfg.cast_secs),
            endpoint_health: Duration::from_secs(cfg.endpoint_health_secs),
            endpoint_start: Duration::from_secs(cfg.endpoint_start_secs),
            scan: Duration::from_secs(cfg.scan_secs),
            lookup: Duration::from_secs(cfg.lookup_secs),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists, falling back to built-in defaults when it does not
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
