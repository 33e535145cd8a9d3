//! Retention-driven selection of devices to delete.
//!
//! # Design
//! - Candidates are scanned oldest-first; unseen devices come before any
//!   observed one and ties keep listing order.
//! - The survivor floor is measured against the server-reported total, so the
//!   selection never exceeds `total - min_surviving` entries.
//! - Selection is pure: deletion is left to the caller.

use chrono::Utc;

use crate::device::{Device, DeviceInventory};

/// Milliseconds in one day, the unit `last_seen_ts` is expressed in.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Caller-supplied retention rules for one selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Devices seen within this many days are kept. `None` or zero disables the check.
    pub min_days: Option<u32>,
    /// Number of devices that always survive.
    pub min_surviving: u64,
    /// Restrict selection to this single device, regardless of age.
    pub device_id: Option<String>,
}

impl RetentionPolicy {
    /// Policy that keeps `min_surviving` devices and applies no age filter.
    #[must_use]
    pub const fn keeping(min_surviving: u64) -> Self {
        Self {
            min_days: None,
            min_surviving,
            device_id: None,
        }
    }

    /// Keep devices seen within the last `days` days.
    #[must_use]
    pub const fn with_min_days(mut self, days: u32) -> Self {
        self.min_days = Some(days);
        self
    }

    /// Target a single device instead of scanning by age.
    #[must_use]
    pub fn targeting(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Computes which devices of one account may be deleted under a [`RetentionPolicy`].
#[derive(Debug, Clone)]
pub struct DevicePruneSelector {
    policy: RetentionPolicy,
    now_ms: i64,
}

impl DevicePruneSelector {
    /// Selector evaluated against the system clock.
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self::at(policy, Utc::now().timestamp_millis())
    }

    /// Selector evaluated against a fixed point in time (milliseconds since epoch).
    #[must_use]
    pub const fn at(policy: RetentionPolicy, now_ms: i64) -> Self {
        Self { policy, now_ms }
    }

    /// Policy this selector applies.
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Timestamp after which a device counts as recently active.
    #[must_use]
    pub fn cutoff_ms(&self) -> Option<i64> {
        self.policy
            .min_days
            .filter(|days| *days > 0)
            .map(|days| {
                self.now_ms
                    .saturating_sub(i64::from(days).saturating_mul(MILLIS_PER_DAY))
            })
    }

    /// Devices to delete, oldest first.
    #[must_use]
    pub fn select<'a>(&self, inventory: &'a DeviceInventory) -> Vec<&'a Device> {
        let floor = self.policy.min_surviving;
        if inventory.total <= floor {
            tracing::debug!(
                total = inventory.total,
                min_surviving = floor,
                "device count at or below survivor floor"
            );
            return Vec::new();
        }

        let mut candidates: Vec<&Device> = inventory.devices.iter().collect();
        candidates.sort_by_key(|device| device.effective_last_seen());

        let cutoff = self.cutoff_ms();
        let target = self.policy.device_id.as_deref();
        let mut selected = Vec::new();

        for device in candidates {
            let removed = u64::try_from(selected.len()).unwrap_or(u64::MAX);
            if inventory.total.saturating_sub(removed) <= floor {
                break;
            }

            if let Some(target) = target {
                if device.device_id == target {
                    selected.push(device);
                    break;
                }
                continue;
            }

            if cutoff.is_some_and(|cutoff| device.effective_last_seen() > cutoff) {
                continue;
            }
            selected.push(device);
        }

        tracing::debug!(
            total = inventory.total,
            listed = inventory.devices.len(),
            selected = selected.len(),
            "device prune selection computed"
        );
        selected
    }
}

/// Shorthand for [`DevicePruneSelector::select`] at a fixed time.
#[must_use]
pub fn select_devices_to_prune<'a>(
    inventory: &'a DeviceInventory,
    policy: &RetentionPolicy,
    now_ms: i64,
) -> Vec<&'a Device> {
    DevicePruneSelector::at(policy.clone(), now_ms).select(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn days_ago(days: i64) -> Option<i64> {
        Some(NOW - days * MILLIS_PER_DAY)
    }

    fn ids(selection: &[&Device]) -> Vec<String> {
        selection
            .iter()
            .map(|device| device.device_id.clone())
            .collect()
    }

    fn sample_inventory() -> DeviceInventory {
        DeviceInventory::from_devices(vec![
            Device::new("a", None),
            Device::new("b", days_ago(200)),
            Device::new("c", days_ago(1)),
            Device::new("d", days_ago(50)),
            Device::new("e", days_ago(10)),
        ])
    }

    #[test]
    fn selects_stale_devices_oldest_first() {
        let inventory = sample_inventory();
        let policy = RetentionPolicy::keeping(2).with_min_days(90);
        let selection = select_devices_to_prune(&inventory, &policy, NOW);
        assert_eq!(ids(&selection), vec!["a", "b"]);
    }

    #[test]
    fn floor_at_or_above_total_selects_nothing() {
        let inventory = sample_inventory();
        for floor in [5, 6, 100] {
            let selection =
                select_devices_to_prune(&inventory, &RetentionPolicy::keeping(floor), NOW);
            assert!(selection.is_empty(), "floor {floor} should keep everything");
        }
    }

    #[test]
    fn without_age_filter_stops_at_floor() {
        let inventory = sample_inventory();
        let selection = select_devices_to_prune(&inventory, &RetentionPolicy::keeping(1), NOW);
        assert_eq!(ids(&selection), vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn zero_min_days_disables_recency_filter() {
        let inventory = sample_inventory();
        let policy = RetentionPolicy::keeping(3).with_min_days(0);
        let selector = DevicePruneSelector::at(policy, NOW);
        assert_eq!(selector.cutoff_ms(), None);
        assert_eq!(ids(&selector.select(&inventory)), vec!["a", "b"]);
    }

    #[test]
    fn recency_threshold_is_respected() {
        let inventory = DeviceInventory::from_devices(vec![
            Device::new("fresh", days_ago(29)),
            Device::new("stale", days_ago(31)),
            Device::new("unseen", None),
        ]);
        let policy = RetentionPolicy::keeping(0).with_min_days(30);
        let selection = select_devices_to_prune(&inventory, &policy, NOW);
        assert_eq!(ids(&selection), vec!["unseen", "stale"]);
    }

    #[test]
    fn device_at_exact_cutoff_is_selected() {
        let inventory = DeviceInventory::from_devices(vec![Device::new("edge", days_ago(30))]);
        let policy = RetentionPolicy::keeping(0).with_min_days(30);
        let selection = select_devices_to_prune(&inventory, &policy, NOW);
        assert_eq!(ids(&selection), vec!["edge"]);
    }

    #[test]
    fn targeted_device_is_selected_regardless_of_age() {
        let inventory = sample_inventory();
        let policy = RetentionPolicy::keeping(2).with_min_days(90).targeting("c");
        let selection = select_devices_to_prune(&inventory, &policy, NOW);
        assert_eq!(ids(&selection), vec!["c"]);
    }

    #[test]
    fn unknown_target_selects_nothing() {
        let inventory = sample_inventory();
        let policy = RetentionPolicy::keeping(0).targeting("zzz");
        assert!(select_devices_to_prune(&inventory, &policy, NOW).is_empty());
    }

    #[test]
    fn target_respects_floor() {
        let inventory = sample_inventory();
        let policy = RetentionPolicy::keeping(5).targeting("a");
        assert!(select_devices_to_prune(&inventory, &policy, NOW).is_empty());
    }

    #[test]
    fn ties_keep_listing_order() {
        let inventory = DeviceInventory::from_devices(vec![
            Device::new("x", None),
            Device::new("y", Some(NOW)),
            Device::new("z", None),
            Device::new("w", Some(NOW)),
        ]);
        let selector = DevicePruneSelector::at(RetentionPolicy::keeping(0), NOW);
        let first = ids(&selector.select(&inventory));
        assert_eq!(first, vec!["x", "z", "y", "w"]);
        assert_eq!(ids(&selector.select(&inventory)), first);
    }

    #[test]
    fn reported_total_above_listing_still_caps_selection() {
        let mut inventory = sample_inventory();
        inventory.total = 7;
        let selection = select_devices_to_prune(&inventory, &RetentionPolicy::keeping(5), NOW);
        assert_eq!(ids(&selection), vec!["a", "b"]);
    }

    #[test]
    fn missing_total_selects_nothing() {
        let mut inventory = sample_inventory();
        inventory.total = 0;
        assert!(select_devices_to_prune(&inventory, &RetentionPolicy::keeping(0), NOW).is_empty());
    }
}
