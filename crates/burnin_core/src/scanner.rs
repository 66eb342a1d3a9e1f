//! One scan cycle: collect, count, update, advance, persist, notify.
//!
//! Devices are scanned strictly one after another so several network-backed
//! inboxes are never enumerated at once. The store lock is held from load to
//! save.

use crate::approval::{ApprovalRecords, ApprovalRequest};
use crate::collector::{collect_timestamps, InboxStatus};
use crate::config::Config;
use crate::cutoff::{count_window, WindowCounts};
use crate::device::{DeviceState, ScanState};
use crate::engine::{Advancement, AdvancementEngine};
use crate::error::Result;
use crate::filter::FileFilter;
use crate::lock::lock_exclusive;
use crate::notifier::{notifier_for, Notifier};
use crate::report::{device_progress, DeviceProgress, DeviceScanResult, ScanReport, StatusSnapshot};
use crate::store::StorePaths;
use crate::tier::{TierLadder, TierStep};
use crate::workflow::{notify_all, ApprovalWorkflow, WorkflowSettings};
use chrono::{DateTime, Local, Utc};
use std::time::Instant;
use tracing::{debug, info, warn};

/// How this cycle picks each device's cutoff.
struct CutoffPolicy {
    /// No scan has completed against this state file yet
    first_scan: bool,
    /// Every file present on the first scan is historical
    bootstrap: bool,
    previous_scan: Option<DateTime<Utc>>,
}

impl CutoffPolicy {
    /// Production start on the first scan. After that, the start of the last
    /// scan that read the device's inbox, so an outage never skips a window.
    fn cutoff_for(&self, device: &DeviceState) -> DateTime<Utc> {
        if self.first_scan {
            device.production_start_date
        } else {
            device
                .last_counted_scan
                .or(self.previous_scan)
                .unwrap_or(device.production_start_date)
        }
    }
}

pub struct Scanner {
    config: Config,
    filter: FileFilter,
    engine: AdvancementEngine,
    notifier: Box<dyn Notifier>,
}

impl Scanner {
    pub fn new(config: Config, notifier: Box<dyn Notifier>) -> Result<Self> {
        let filter = FileFilter::compile(&config.file_filtering)?;
        let engine = AdvancementEngine::new(
            TierLadder::new(&config.tier_requirements),
            config.excluded_tiers.clone(),
        );
        debug!(filter = %filter.describe(), notifier = notifier.name(), "Scanner ready");
        Ok(Self {
            config,
            filter,
            engine,
            notifier,
        })
    }

    /// Scanner with the notifier the configuration selects.
    pub fn from_config(config: Config) -> Result<Self> {
        let notifier = notifier_for(&config);
        Self::new(config, notifier)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn store_paths(&self) -> StorePaths {
        self.config.store_paths()
    }

    pub fn run_scan(&self) -> Result<ScanReport> {
        self.run_scan_at(Utc::now())
    }

    /// Run one cycle treating `scan_start` as the current instant.
    ///
    /// Files stamped at or after `scan_start` are left for the next cycle,
    /// whose cutoff is `scan_start`.
    pub fn run_scan_at(&self, scan_start: DateTime<Utc>) -> Result<ScanReport> {
        let started = Instant::now();
        let paths = self.store_paths();
        let _lock = lock_exclusive(&paths.state)?;

        let mut workflow = ApprovalWorkflow::open(
            &paths,
            WorkflowSettings::from_config(&self.config),
            scan_start,
            || ScanState::initial(&self.config, scan_start),
        )?;

        let enabled: Vec<String> = self.config.enabled_devices().map(|(name, _)| name.clone()).collect();
        if enabled.is_empty() {
            warn!("No enabled devices found in configuration");
            let mut report = ScanReport::from_documents(&self.config, workflow.state(), workflow.approvals());
            report.duration_ms = Some(started.elapsed().as_millis() as u64);
            return Ok(report);
        }

        let first_scan = !workflow.state().bootstrap_completed;
        let policy = CutoffPolicy {
            first_scan,
            bootstrap: first_scan && self.config.production_settings.bootstrap_mode,
            previous_scan: workflow.state().last_scan_instant,
        };
        let bootstrap = policy.bootstrap;

        info!(
            mode = self.config.run_mode().as_str(),
            devices = enabled.len(),
            first_scan,
            bootstrap,
            cutoff = ?policy.previous_scan,
            "Starting scan"
        );
        if bootstrap {
            info!("Bootstrap mode: every file present now is counted as historical");
        }

        let mut results = Vec::with_capacity(enabled.len());
        let mut created: Vec<ApprovalRequest> = Vec::new();

        for name in &enabled {
            let (mut result, step) = self.scan_device(&mut workflow, name, scan_start, &policy);
            if let Some(step) = step {
                match workflow.stage_request(name, &step, scan_start) {
                    Ok(request) => {
                        result.requested = Some(request.id.clone());
                        created.push(request);
                    }
                    Err(e) => warn!(device = %name, error = %e, "Could not create approval request"),
                }
                if let Some(device) = workflow.state().device(name) {
                    result.approval_status = device.approval_status;
                }
            }
            results.push(result);
        }

        let state = workflow.state_mut();
        if first_scan {
            state.bootstrap_completed = true;
            state.bootstrap_used_on_deployment = Some(bootstrap);
            if bootstrap {
                info!("Bootstrap mode consumed, later scans count incrementally");
            }
        }
        state.last_scan_instant = Some(scan_start);
        state.config_file_used = Some(self.config.source_label());

        workflow.commit()?;
        notify_all(self.notifier.as_ref(), &created);

        let mut report = ScanReport::from_documents(&self.config, workflow.state(), workflow.approvals());
        report.duration_ms = Some(started.elapsed().as_millis() as u64);
        report.bootstrap_applied = bootstrap;
        report.devices_scanned = results.len();
        report.requests_created = created.iter().map(|r| r.id.clone()).collect();
        report.scan_results = results;

        info!(
            devices = report.devices_scanned,
            requests = report.requests_created.len(),
            pending = report.pending_approvals,
            duration_ms = report.duration_ms.unwrap_or(0),
            "Scan complete"
        );
        Ok(report)
    }

    /// Count one inbox and fold it into the device record.
    ///
    /// Returns the per-device result and the step the device qualifies for.
    fn scan_device(
        &self,
        workflow: &mut ApprovalWorkflow,
        name: &str,
        scan_start: DateTime<Utc>,
        policy: &CutoffPolicy,
    ) -> (DeviceScanResult, Option<TierStep>) {
        let inbox = self.config.device_inbox(name);
        let listing = collect_timestamps(&inbox, &self.filter);

        let device_config = self.config.devices.get(name);
        let exclude_final = device_config.map(|d| d.exclude_final_tier).unwrap_or(false);

        let device = workflow
            .state_mut()
            .devices
            .entry(name.to_string())
            .or_insert_with(|| {
                let tier = device_config.map(|d| d.current_tier).unwrap_or_default();
                let production_start = self.config.production_start(name, scan_start);
                info!(device = name, tier = %tier, production_start = %production_start, "Tracking new device");
                DeviceState::new(tier, production_start, scan_start)
            });

        let cutoff = policy.cutoff_for(device);
        let total = listing.len() as u64;
        let counts = if policy.bootstrap || device.is_pending() {
            WindowCounts::all_historical(total)
        } else {
            count_window(&listing.stamps, cutoff, scan_start)
        };
        let added = device.record_scan(&counts);
        if listing.status == InboxStatus::Ok {
            device.last_counted_scan = Some(scan_start);
        } else {
            warn!(device = name, inbox = ?listing.status, cutoff = %cutoff, "Inbox not read, cutoff held for next scan");
        }

        info!(
            device = name,
            tier = %device.current_tier,
            inbox = ?listing.status,
            total = counts.total,
            historical = counts.historical,
            new = counts.new,
            deferred = counts.deferred,
            added,
            count = device.count,
            status = %device.approval_status,
            "Device scanned"
        );

        let advancement = self.engine.check(device, exclude_final);
        let (step, hold) = match advancement {
            Advancement::Eligible(step) => {
                info!(
                    device = name,
                    from = %step.from,
                    to = %step.to,
                    count = device.count,
                    threshold = step.threshold,
                    "Device eligible for tier advancement"
                );
                (Some(step), None)
            }
            Advancement::Hold(hold) => {
                debug!(device = name, ?hold, "No advancement");
                (None, Some(hold))
            }
        };

        let result = DeviceScanResult {
            device: name.to_string(),
            inbox_status: listing.status,
            cutoff,
            counts,
            added,
            count: device.count,
            tier: device.current_tier,
            approval_status: device.approval_status,
            requested: None,
            hold,
        };
        (result, step)
    }

    /// Report from the persisted documents without scanning.
    pub fn report(&self) -> Result<ScanReport> {
        let (state, approvals) = self.load_documents()?;
        Ok(ScanReport::from_documents(&self.config, &state, &approvals))
    }

    pub fn status(&self) -> Result<StatusSnapshot> {
        let (state, approvals) = self.load_documents()?;
        Ok(StatusSnapshot::new(
            &self.config,
            &state,
            &approvals,
            Local::now().date_naive(),
        ))
    }

    pub fn progress(&self) -> Result<Vec<DeviceProgress>> {
        let (state, _) = self.load_documents()?;
        Ok(device_progress(&self.config, &state, &self.engine))
    }

    /// Readers need no lock: documents are only ever replaced whole.
    fn load_documents(&self) -> Result<(ScanState, ApprovalRecords)> {
        let paths = self.store_paths();
        let state = paths.state_store().load_or_default()?;
        let approvals = paths.approval_store().load_or_default()?;
        Ok((state, approvals))
    }
}
