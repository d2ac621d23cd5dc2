use std::net::IpAddr;
use chrono::{DateTime, Duration, Utc};

/// The last known location of the supervised display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Network address the device answered on
    pub address: IpAddr,

    /// Hostname the device is known by, e.g. "nest-hub"
    pub hostname: String,

    /// Last time the address was confirmed by discovery
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn new(address: IpAddr, hostname: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            address,
            hostname: hostname.into(),
            last_seen,
        }
    }

    /// How long ago the record was last confirmed, as seen from `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }
}
