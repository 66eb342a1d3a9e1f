//! Read-only snapshots for display and logging.

use crate::approval::{ApprovalRecords, Decision};
use crate::collector::InboxStatus;
use crate::config::{Config, RunMode};
use crate::cutoff::WindowCounts;
use crate::device::{DeviceApprovalStatus, ScanState};
use crate::engine::{AdvancementEngine, Hold};
use crate::tier::Tier;
use burnin_ids::ApprovalId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// What one scan did to one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceScanResult {
    pub device: String,
    pub inbox_status: InboxStatus,
    pub cutoff: DateTime<Utc>,
    pub counts: WindowCounts,
    /// Units added to `count` this scan
    pub added: u64,
    pub count: u64,
    pub tier: Tier,
    pub approval_status: DeviceApprovalStatus,
    /// Request raised by this scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<ApprovalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold: Option<Hold>,
}

/// Persisted per-device figures.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device: String,
    pub tier: Tier,
    pub count: u64,
    pub approval_status: DeviceApprovalStatus,
    pub total_files: u64,
    pub historical_files: u64,
    pub tier_start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_approval_id: Option<ApprovalId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Start of the reported scan (the last completed one for a persisted report)
    pub scan_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub config_file: String,
    pub run_mode: RunMode,
    pub bootstrap_applied: bool,
    pub devices_scanned: usize,
    pub pending_approvals: usize,
    pub requests_created: Vec<ApprovalId>,
    pub devices: Vec<DeviceSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scan_results: Vec<DeviceScanResult>,
    /// Number of tracked devices per tier, every tier present
    pub tier_summary: BTreeMap<Tier, usize>,
}

impl ScanReport {
    /// Snapshot of the persisted documents, no scan attached.
    pub fn from_documents(config: &Config, state: &ScanState, approvals: &ApprovalRecords) -> Self {
        let devices: Vec<DeviceSummary> = state
            .devices
            .iter()
            .map(|(name, device)| DeviceSummary {
                device: name.clone(),
                tier: device.current_tier,
                count: device.count,
                approval_status: device.approval_status,
                total_files: device.total_files,
                historical_files: device.historical_files,
                tier_start_date: device.tier_start_date,
                pending_approval_id: device.pending_approval_id.clone(),
            })
            .collect();

        let mut tier_summary: BTreeMap<Tier, usize> = Tier::ALL.iter().map(|t| (*t, 0)).collect();
        for summary in &devices {
            *tier_summary.entry(summary.tier).or_insert(0) += 1;
        }

        Self {
            scan_time: state.last_scan_instant,
            duration_ms: None,
            config_file: config.source_label(),
            run_mode: config.run_mode(),
            bootstrap_applied: false,
            devices_scanned: 0,
            pending_approvals: approvals.pending.len(),
            requests_created: Vec::new(),
            devices,
            scan_results: Vec::new(),
            tier_summary,
        }
    }
}

/// Distance of one device from its next tier.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProgress {
    pub device: String,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    pub requirement: Option<u64>,
    pub count: u64,
    pub remaining: Option<u64>,
    /// 0-100, terminal tier reports 100
    pub percent: f64,
    pub approval_status: DeviceApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<Hold>,
}

/// Progress for every tracked device, closest to advancing first.
pub fn device_progress(config: &Config, state: &ScanState, engine: &AdvancementEngine) -> Vec<DeviceProgress> {
    let mut rows: Vec<DeviceProgress> = state
        .devices
        .iter()
        .map(|(name, device)| {
            let exclude_final = config
                .devices
                .get(name)
                .map(|d| d.exclude_final_tier)
                .unwrap_or(false);
            let step = engine.ladder().step_from(device.current_tier);
            let (requirement, remaining, percent) = match step {
                Some(step) => {
                    let pct = (device.count as f64 / step.threshold as f64 * 100.0).min(100.0);
                    (
                        Some(step.threshold),
                        Some(step.threshold.saturating_sub(device.count)),
                        pct,
                    )
                }
                None => (None, None, 100.0),
            };
            let blocked = if device.is_pending() {
                Some(Hold::Pending)
            } else {
                engine.blocked_at(device.current_tier, exclude_final)
            };
            DeviceProgress {
                device: name.clone(),
                tier: device.current_tier,
                next_tier: step.map(|s| s.to),
                requirement,
                count: device.count,
                remaining,
                percent,
                approval_status: device.approval_status,
                blocked,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.percent
            .partial_cmp(&a.percent)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.device.cmp(&b.device))
    });
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub config_file: String,
    pub run_mode: RunMode,
    pub last_scan: Option<DateTime<Utc>>,
    pub bootstrap_completed: bool,
    pub devices_configured: usize,
    pub devices_enabled: usize,
    pub devices_tracked: usize,
    pub pending_approvals: usize,
    pub approved_today: usize,
    pub rejected_today: usize,
}

impl StatusSnapshot {
    pub fn new(config: &Config, state: &ScanState, approvals: &ApprovalRecords, today: NaiveDate) -> Self {
        Self {
            config_file: config.source_label(),
            run_mode: config.run_mode(),
            last_scan: state.last_scan_instant,
            bootstrap_completed: state.bootstrap_completed,
            devices_configured: config.devices.len(),
            devices_enabled: config.enabled_devices().count(),
            devices_tracked: state.devices.len(),
            pending_approvals: approvals.pending.len(),
            approved_today: approvals.decided_on(today, Decision::Approve),
            rejected_today: approvals.decided_on(today, Decision::Reject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::tier::TierLadder;

    fn config() -> Config {
        Config::from_json_str(
            r#"{ "scan_path": "/data",
                 "devices": { "A": { "enabled": true }, "B": { "enabled": true, "exclude_final_tier": true },
                              "C": { "enabled": false } } }"#,
        )
        .unwrap()
    }

    fn state() -> ScanState {
        let now = Utc::now();
        let mut state = ScanState::default();
        let mut a = DeviceState::new(Tier::Hours24, now, now);
        a.count = 125;
        let mut b = DeviceState::new(Tier::Hours3, now, now);
        b.count = 1900;
        let c = DeviceState::new(Tier::Hours2, now, now);
        state.devices.insert("A".to_string(), a);
        state.devices.insert("B".to_string(), b);
        state.devices.insert("C".to_string(), c);
        state
    }

    #[test]
    fn tier_summary_lists_every_tier() {
        let report = ScanReport::from_documents(&config(), &state(), &ApprovalRecords::default());
        assert_eq!(report.tier_summary.len(), Tier::ALL.len());
        assert_eq!(report.tier_summary[&Tier::Hours24], 1);
        assert_eq!(report.tier_summary[&Tier::Hours12], 0);
        assert_eq!(report.tier_summary[&Tier::Hours2], 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tier_summary"]["3h"], 1);
    }

    #[test]
    fn progress_sorted_by_proximity() {
        let engine = AdvancementEngine::new(TierLadder::default(), Vec::new());
        let rows = device_progress(&config(), &state(), &engine);
        let order: Vec<&str> = rows.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);

        let a = rows.iter().find(|r| r.device == "A").unwrap();
        assert_eq!(a.remaining, Some(125));
        assert!((a.percent - 50.0).abs() < f64::EPSILON);

        let b = rows.iter().find(|r| r.device == "B").unwrap();
        assert_eq!(b.blocked, Some(Hold::FinalTierExcluded));

        let c = rows.iter().find(|r| r.device == "C").unwrap();
        assert_eq!(c.next_tier, None);
        assert_eq!(c.blocked, Some(Hold::Terminal));
    }

    #[test]
    fn status_counts() {
        let status = StatusSnapshot::new(
            &config(),
            &state(),
            &ApprovalRecords::default(),
            Utc::now().date_naive(),
        );
        assert_eq!(status.devices_configured, 3);
        assert_eq!(status.devices_enabled, 2);
        assert_eq!(status.devices_tracked, 3);
        assert_eq!(status.pending_approvals, 0);
    }
}
