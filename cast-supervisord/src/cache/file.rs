use std::net::IpAddr;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use shared::types::DeviceRecord;

/// On-disk shape of the cache file.
///
/// Fields are kept as strings so a bad address or timestamp can be reported as
/// malformed instead of failing the whole parse.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    #[serde(alias = "nest_hub_ip")]
    address: String,
    last_seen: String,
    #[serde(default)]
    hostname: String,
}

/// What the cache file held when it was inspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Missing,
    Malformed(String),
    /// Present but at or past the staleness horizon
    Stale(DeviceRecord),
    Fresh(DeviceRecord),
}

/// Persists the last discovered device address across restarts
#[derive(Debug, Clone)]
pub struct AddressCache {
    path: PathBuf,
    max_age: Duration,
}

impl AddressCache {
    pub fn new(path: impl Into<PathBuf>, max_age: std::time::Duration) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::from_std(max_age).unwrap_or(Duration::MAX),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classify the persisted record as of `now`
    pub fn inspect_at(&self, now: DateTime<Utc>) -> CacheLookup {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheLookup::Missing,
            Err(e) => return CacheLookup::Malformed(format!("unreadable: {}", e)),
        };

        let record = match parse_record(&contents) {
            Ok(record) => record,
            Err(e) => return CacheLookup::Malformed(format!("{:#}", e)),
        };

        if record.age_at(now) < self.max_age {
            CacheLookup::Fresh(record)
        } else {
            CacheLookup::Stale(record)
        }
    }

    /// Returns the cached record only if it is younger than the staleness horizon
    pub fn load(&self) -> Option<DeviceRecord> {
        match self.inspect_at(Utc::now()) {
            CacheLookup::Fresh(record) => {
                tracing::info!("Loaded cached address {} ({})", record.address, record.hostname);
                Some(record)
            }
            CacheLookup::Stale(record) => {
                tracing::info!(
                    "Cached address {} last seen {}, too old, will rescan",
                    record.address,
                    record.last_seen.to_rfc3339()
                );
                None
            }
            CacheLookup::Missing => {
                tracing::debug!("No cache file at {}", self.path.display());
                None
            }
            CacheLookup::Malformed(reason) => {
                tracing::warn!("Ignoring malformed cache {}: {}", self.path.display(), reason);
                None
            }
        }
    }

    /// Overwrite the cache with `address`, stamped now. Failures are logged only.
    pub fn save(&self, address: IpAddr, hostname: &str) {
        let record = DeviceRecord::new(address, hostname, Utc::now());
        match self.write(&record) {
            Ok(()) => tracing::debug!("Cached address {} to {}", address, self.path.display()),
            Err(e) => tracing::warn!("Failed to save cache: {:#}", e),
        }
    }

    /// Write `record` atomically, creating the parent directory if needed
    pub fn write(&self, record: &DeviceRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let persisted = PersistedRecord {
            address: record.address.to_string(),
            last_seen: record.last_seen.to_rfc3339(),
            hostname: record.hostname.clone(),
        };
        let json = serde_json::to_string_pretty(&persisted)
            .context("Failed to serialize cache record")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

fn parse_record(contents: &str) -> Result<DeviceRecord> {
    let persisted: PersistedRecord =
        serde_json::from_str(contents).context("invalid cache JSON")?;

    let address: IpAddr = persisted
        .address
        .parse()
        .with_context(|| format!("invalid address {:?}", persisted.address))?;

    let last_seen = parse_timestamp(&persisted.last_seen)
        .with_context(|| format!("invalid timestamp {:?}", persisted.last_seen))?;

    Ok(DeviceRecord::new(address, persisted.hostname, last_seen))
}

/// RFC 3339, or a naive ISO-8601 local time as older deployments wrote it
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .context("local time does not exist")
}
