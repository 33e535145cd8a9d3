//! Device records as returned by an account's device-listing endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Effective timestamp used for devices that were never observed.
///
/// Sorts before every real timestamp, so unseen devices are treated as the
/// oldest ones.
pub const NEVER_SEEN_TS: i64 = 0;

/// One logged-in session of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier, unique within the owning account.
    pub device_id: String,
    /// Last activity in milliseconds since the unix epoch, if ever observed.
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
    /// Descriptive fields (display name, IP, user agent) passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Build a device record without passthrough fields.
    #[must_use]
    pub fn new(device_id: impl Into<String>, last_seen_ts: Option<i64>) -> Self {
        Self {
            device_id: device_id.into(),
            last_seen_ts,
            extra: Map::new(),
        }
    }

    /// Timestamp used for ordering and age checks.
    #[must_use]
    pub const fn effective_last_seen(&self) -> i64 {
        match self.last_seen_ts {
            Some(ts) => ts,
            None => NEVER_SEEN_TS,
        }
    }
}

/// Snapshot of every device belonging to one account.
///
/// `total` is reported by the server and may exceed `devices.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInventory {
    /// Devices in listing order.
    #[serde(default)]
    pub devices: Vec<Device>,
    /// Server-reported device count; zero when the response omitted it or
    /// reported `null`.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total: u64,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeviceInventory {
    /// Build an inventory whose `total` matches the supplied devices.
    #[must_use]
    pub fn from_devices(devices: Vec<Device>) -> Self {
        let total = u64::try_from(devices.len()).unwrap_or(u64::MAX);
        Self { devices, total }
    }
}
