//! Per-device tier state and the process-wide scan state document.

use crate::config::{Config, RunMode};
use crate::cutoff::WindowCounts;
use crate::tier::Tier;
use burnin_ids::ApprovalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Approval gate status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceApprovalStatus {
    #[default]
    None,
    PendingApproval,
    Approved,
    Rejected,
}

impl DeviceApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for DeviceApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record for one device.
///
/// `count` only moves forward between transitions and is reset exactly when a
/// decision is committed. While `approval_status` is `PendingApproval` it is
/// frozen and `pending_approval_id` points at the open request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub current_tier: Tier,
    pub count: u64,
    pub tier_start_date: DateTime<Utc>,
    #[serde(default)]
    pub approval_status: DeviceApprovalStatus,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub historical_files: u64,
    pub deployment_date: DateTime<Utc>,
    #[serde(rename = "device_production_start_date")]
    pub production_start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval_id: Option<ApprovalId>,
    /// Tier from the config when the device was first tracked
    #[serde(default)]
    pub configured_tier: Tier,
    /// Start of the last scan that actually read this device's inbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_counted_scan: Option<DateTime<Utc>>,
}

impl DeviceState {
    pub fn new(tier: Tier, production_start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            current_tier: tier,
            count: 0,
            tier_start_date: now,
            approval_status: DeviceApprovalStatus::None,
            total_files: 0,
            historical_files: 0,
            deployment_date: now,
            production_start_date: production_start,
            pending_approval_id: None,
            configured_tier: tier,
            last_counted_scan: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.approval_status == DeviceApprovalStatus::PendingApproval
    }

    /// Fold one scan's counts into the record.
    ///
    /// Observational totals are high-water marks. New units are added to
    /// `count` unless the device is frozen. Returns the units added.
    pub fn record_scan(&mut self, counts: &WindowCounts) -> u64 {
        self.total_files = self.total_files.max(counts.total);
        self.historical_files = self.historical_files.max(counts.historical);
        if self.is_pending() {
            return 0;
        }
        self.count += counts.new;
        counts.new
    }

    /// Enter the pending state for `id`. Freezes `count`.
    pub(crate) fn mark_pending(&mut self, id: ApprovalId) {
        self.approval_status = DeviceApprovalStatus::PendingApproval;
        self.pending_approval_id = Some(id);
    }

    /// Drop a pending link whose request no longer exists. `count` is kept.
    pub(crate) fn clear_pending(&mut self) {
        self.approval_status = DeviceApprovalStatus::None;
        self.pending_approval_id = None;
    }

    /// Commit an approval: move to `tier` and restart the accrual window.
    pub(crate) fn commit_approved(&mut self, tier: Tier, now: DateTime<Utc>) {
        self.current_tier = tier;
        self.count = 0;
        self.tier_start_date = now;
        self.approval_status = DeviceApprovalStatus::Approved;
        self.pending_approval_id = None;
    }

    /// Commit a rejection: same tier, accrual window restarts from zero.
    pub(crate) fn commit_rejected(&mut self, now: DateTime<Utc>) {
        self.count = 0;
        self.tier_start_date = now;
        self.approval_status = DeviceApprovalStatus::Rejected;
        self.pending_approval_id = None;
    }
}

/// Process-wide persisted scan record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    /// Start of the previous completed scan; the next scan's cutoff
    #[serde(rename = "last_scan", default)]
    pub last_scan_instant: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bootstrap_completed: bool,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_mode: Option<String>,
    /// Whether bootstrap mode was applied on the first scan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_used_on_deployment: Option<bool>,
}

impl ScanState {
    /// Fresh state for a first deployment.
    pub fn initial(config: &Config, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            config_file_used: Some(config.source_label()),
            ..Self::default()
        };
        let mode = config.run_mode();
        if mode != RunMode::Development {
            state.deployment_date = Some(now);
            state.deployment_mode = Some(mode.as_str().to_string());
        }
        state
    }

    pub fn device(&self, name: &str) -> Option<&DeviceState> {
        self.devices.get(name)
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut DeviceState> {
        self.devices.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn counts(total: u64, historical: u64, new: u64) -> WindowCounts {
        WindowCounts {
            total,
            historical,
            new,
            deferred: total - historical - new,
        }
    }

    #[test]
    fn record_scan_accumulates_new_units() {
        let mut device = DeviceState::new(Tier::Hours24, now(), now());
        assert_eq!(device.record_scan(&counts(10, 4, 6)), 6);
        assert_eq!(device.record_scan(&counts(15, 10, 5)), 5);
        assert_eq!(device.count, 11);
        assert_eq!(device.total_files, 15);
        assert_eq!(device.historical_files, 10);
    }

    #[test]
    fn pending_device_count_is_frozen() {
        let mut device = DeviceState::new(Tier::Hours24, now(), now());
        device.count = 300;
        device.mark_pending(ApprovalId::new());
        assert_eq!(device.record_scan(&counts(400, 350, 50)), 0);
        assert_eq!(device.count, 300);
        assert_eq!(device.total_files, 400);
    }

    #[test]
    fn totals_never_decrease() {
        let mut device = DeviceState::new(Tier::Hours24, now(), now());
        device.record_scan(&counts(50, 50, 0));
        device.record_scan(&WindowCounts::default());
        assert_eq!(device.total_files, 50);
        assert_eq!(device.historical_files, 50);
    }

    #[test]
    fn commits_reset_count() {
        let mut device = DeviceState::new(Tier::Hours24, now(), now());
        device.count = 260;
        device.mark_pending(ApprovalId::new());
        device.commit_approved(Tier::Hours12, now());
        assert_eq!(device.current_tier, Tier::Hours12);
        assert_eq!(device.count, 0);
        assert_eq!(device.approval_status, DeviceApprovalStatus::Approved);
        assert!(device.pending_approval_id.is_none());

        device.count = 10;
        device.mark_pending(ApprovalId::new());
        device.commit_rejected(now());
        assert_eq!(device.current_tier, Tier::Hours12);
        assert_eq!(device.count, 0);
        assert_eq!(device.approval_status, DeviceApprovalStatus::Rejected);
    }

    #[test]
    fn state_round_trips_with_legacy_keys() {
        let mut state = ScanState::default();
        state.last_scan_instant = Some(now());
        state
            .devices
            .insert("DEV1".to_string(), DeviceState::new(Tier::Hours6, now(), now()));
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("last_scan").is_some());
        assert_eq!(json["devices"]["DEV1"]["current_tier"], "6h");
        assert_eq!(json["devices"]["DEV1"]["approval_status"], "NONE");
        assert!(json["devices"]["DEV1"]
            .get("device_production_start_date")
            .is_some());

        let back: ScanState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
