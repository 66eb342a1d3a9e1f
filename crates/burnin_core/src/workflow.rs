//! Approval Workflow: the only path through which a device's tier changes.
//!
//! The workflow owns both documents while the store lock is held. Every
//! mutation is applied to copies, the approvals document is written first
//! and the state document second, and only then are the copies swapped in.
//! The approvals document is therefore the commit point: if the process dies
//! between the two writes, [`ApprovalWorkflow::open`] finds the device and
//! request out of step and finishes the job.

use crate::approval::{ApprovalRecords, ApprovalRequest, Decision, RequestStatus};
use crate::config::Config;
use crate::device::{DeviceState, ScanState};
use crate::error::{BurninError, Result};
use crate::notifier::Notifier;
use crate::store::{JsonStore, StorePaths};
use crate::tier::TierStep;
use burnin_ids::ApprovalId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Knobs the workflow needs from the configuration.
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    pub require_approver_name: bool,
    /// Recorded on each request as `config_file`
    pub config_label: Option<String>,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            require_approver_name: config.approval_settings.require_approver_name,
            config_label: Some(config.source_label()),
        }
    }
}

/// One id that could not be resolved in a bulk call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Result of resolving several ids independently.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<ApprovalRequest>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ApprovalWorkflow {
    state_store: JsonStore<ScanState>,
    approval_store: JsonStore<ApprovalRecords>,
    settings: WorkflowSettings,
    state: ScanState,
    approvals: ApprovalRecords,
    /// Approvals document as last written, restored if a state write fails.
    committed: ApprovalRecords,
}

impl ApprovalWorkflow {
    /// Load both documents and repair any half-committed transition.
    ///
    /// The caller must hold the store lock. `fresh` builds the state used when
    /// no state document exists yet.
    pub fn open(
        paths: &StorePaths,
        settings: WorkflowSettings,
        now: DateTime<Utc>,
        fresh: impl FnOnce() -> ScanState,
    ) -> Result<Self> {
        let state_store = paths.state_store();
        let approval_store = paths.approval_store();

        let state = match state_store.load()? {
            Some(state) => state,
            None => {
                info!(path = %state_store.path().display(), "No state document, starting fresh");
                fresh()
            }
        };
        let approvals = approval_store.load_or_default()?;
        debug!(
            devices = state.devices.len(),
            pending = approvals.pending.len(),
            history = approvals.history.len(),
            "Opened approval workflow"
        );

        let mut workflow = Self {
            state_store,
            approval_store,
            settings,
            state,
            committed: approvals.clone(),
            approvals,
        };
        let repairs = workflow.reconcile(now);
        if repairs > 0 {
            warn!(repairs, "Repaired inconsistent approval links, persisting");
            workflow.commit()?;
        }
        Ok(workflow)
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ScanState {
        &mut self.state
    }

    pub fn approvals(&self) -> &ApprovalRecords {
        &self.approvals
    }

    /// Bring device links and the approvals document back in step.
    ///
    /// Returns the number of repairs made. Running it on consistent documents
    /// changes nothing.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> usize {
        let mut repairs = 0;

        for (name, device) in self.state.devices.iter_mut() {
            if !device.is_pending() {
                if device.pending_approval_id.is_some() {
                    warn!(device = %name, "Dropping stale approval link on non-pending device");
                    device.pending_approval_id = None;
                    repairs += 1;
                }
                continue;
            }

            let id = match device.pending_approval_id.clone() {
                Some(id) => id,
                None => {
                    match self.approvals.pending_for_device(name) {
                        Some(request) => {
                            warn!(device = %name, approval_id = %request.id, "Relinking pending device to its request");
                            device.mark_pending(request.id.clone());
                        }
                        None => {
                            warn!(device = %name, "Pending device has no request, clearing");
                            device.clear_pending();
                        }
                    }
                    repairs += 1;
                    continue;
                }
            };

            if self.approvals.pending.contains_key(&id) {
                continue;
            }

            match self.approvals.history_entry(&id) {
                Some(decided) => {
                    warn!(
                        device = %name,
                        approval_id = %id,
                        status = ?decided.status,
                        "Applying decision that was recorded but not committed to device state"
                    );
                    apply_decision(device, decided, now);
                }
                None => {
                    warn!(device = %name, approval_id = %id, "Device points at unknown request, clearing");
                    device.clear_pending();
                }
            }
            repairs += 1;
        }

        for request in self.approvals.pending.values() {
            match self.state.devices.get_mut(&request.device_name) {
                Some(device) if !device.is_pending() => {
                    warn!(
                        device = %request.device_name,
                        approval_id = %request.id,
                        "Open request without a frozen device, relinking"
                    );
                    device.mark_pending(request.id.clone());
                    repairs += 1;
                }
                Some(_) => {}
                None => {
                    debug!(
                        device = %request.device_name,
                        approval_id = %request.id,
                        "Open request for an untracked device"
                    );
                }
            }
        }

        repairs
    }

    /// Add a pending request for `device_name` and freeze the device, in memory only.
    pub(crate) fn stage_request(
        &mut self,
        device_name: &str,
        step: &TierStep,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest> {
        let device = self.state.devices.get_mut(device_name).ok_or_else(|| {
            BurninError::InvalidState(format!("Device '{}' is not tracked", device_name))
        })?;
        if device.is_pending() {
            return Err(BurninError::InvalidState(format!(
                "Device '{}' already has an open approval request",
                device_name
            )));
        }
        if device.current_tier != step.from {
            return Err(BurninError::InvalidState(format!(
                "Device '{}' is at {}, cannot request {} -> {}",
                device_name, device.current_tier, step.from, step.to
            )));
        }

        let id = unused_id(&self.approvals);
        let mut request = ApprovalRequest::new(id.clone(), device_name, step.from, step.to, device.count, now);
        request.production_start_date = Some(device.production_start_date);
        request.config_file = self.settings.config_label.clone();

        self.approvals.pending.insert(id.clone(), request.clone());
        device.mark_pending(id);

        info!(
            approval_id = %request.id,
            device = device_name,
            transition = %request.transition_label(),
            unit_count = request.unit_count,
            "Created approval request"
        );
        Ok(request)
    }

    /// Write the approvals document, then the state document.
    pub fn commit(&mut self) -> Result<()> {
        persist(
            &self.state_store,
            &self.approval_store,
            &self.state,
            &self.approvals,
            &self.committed,
        )?;
        self.committed = self.approvals.clone();
        Ok(())
    }

    /// Record `decision` on a pending request and commit it to the device.
    ///
    /// Fails with `NotFound` if `id` is not pending (including ids already
    /// moved to history). Both documents are written or the in-memory copy is
    /// left unchanged.
    pub fn resolve(
        &mut self,
        id: &ApprovalId,
        decision: Decision,
        approver: &str,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest> {
        let approver = approver.trim();
        if self.settings.require_approver_name && approver.is_empty() {
            return Err(BurninError::InvalidApprover);
        }
        if !self.approvals.pending.contains_key(id) {
            warn!(approval_id = %id, "Approval ID not found");
            return Err(BurninError::NotFound(id.clone()));
        }

        let mut approvals = self.approvals.clone();
        let mut state = self.state.clone();
        let mut request = approvals
            .pending
            .remove(id)
            .ok_or_else(|| BurninError::NotFound(id.clone()))?;
        request.record_decision(decision, approver, now);

        match state.devices.get_mut(&request.device_name) {
            Some(device) if device.pending_approval_id.as_ref() == Some(id) => {
                apply_decision(device, &request, now);
            }
            Some(_) => warn!(
                approval_id = %id,
                device = %request.device_name,
                "Device is not linked to this request, recording decision only"
            ),
            None => warn!(
                approval_id = %id,
                device = %request.device_name,
                "Device is not tracked, recording decision only"
            ),
        }
        approvals.history.push(request.clone());

        persist(&self.state_store, &self.approval_store, &state, &approvals, &self.committed)?;
        self.state = state;
        self.committed = approvals.clone();
        self.approvals = approvals;

        info!(
            approval_id = %id,
            device = %request.device_name,
            transition = %request.transition_label(),
            approver,
            "Request {}",
            decision.verb()
        );
        Ok(request)
    }

    /// Resolve each id independently. One failure never stops the others.
    pub fn resolve_many<S: AsRef<str>>(
        &mut self,
        ids: &[S],
        decision: Decision,
        approver: &str,
        now: DateTime<Utc>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for raw in ids {
            let raw = raw.as_ref().trim();
            let result = ApprovalId::parse(raw)
                .map_err(|e| e.to_string())
                .and_then(|id| {
                    self.resolve(&id, decision, approver, now)
                        .map_err(|e| e.to_string())
                });
            match result {
                Ok(request) => outcome.succeeded.push(request),
                Err(reason) => {
                    warn!(approval_id = raw, %reason, "Could not resolve approval request");
                    outcome.failed.push(BulkFailure {
                        id: raw.to_string(),
                        reason,
                    });
                }
            }
        }
        info!(
            decision = decision.as_str(),
            succeeded = outcome.succeeded_count(),
            failed = outcome.failed_count(),
            "Bulk resolution finished"
        );
        outcome
    }
}

/// Hand each request to the notifier, logging failures.
pub fn notify_all(notifier: &dyn Notifier, requests: &[ApprovalRequest]) {
    for request in requests {
        if let Err(e) = notifier.notify(request) {
            warn!(
                approval_id = %request.id,
                device = %request.device_name,
                notifier = notifier.name(),
                error = %e,
                "Failed to send approval notification, request remains open"
            );
        }
    }
}

/// Approvals first, then state. A failed state write puts `previous` back so
/// the next open has no half-written decision to finish.
fn persist(
    state_store: &JsonStore<ScanState>,
    approval_store: &JsonStore<ApprovalRecords>,
    state: &ScanState,
    approvals: &ApprovalRecords,
    previous: &ApprovalRecords,
) -> Result<()> {
    approval_store.save(approvals)?;
    if let Err(e) = state_store.save(state) {
        match approval_store.save(previous) {
            Ok(()) => warn!(error = %e, "State write failed, approvals document restored"),
            Err(restore) => error!(
                error = %e,
                restore_error = %restore,
                "State write failed and approvals document could not be restored; next open will apply it"
            ),
        }
        return Err(e);
    }
    Ok(())
}

fn apply_decision(device: &mut DeviceState, request: &ApprovalRequest, now: DateTime<Utc>) {
    let at = request.decision_date.unwrap_or(now);
    match request.status {
        RequestStatus::Approve => device.commit_approved(request.proposed_tier, at),
        RequestStatus::Reject => device.commit_rejected(at),
        RequestStatus::Pending => {}
    }
}

fn unused_id(approvals: &ApprovalRecords) -> ApprovalId {
    loop {
        let id = ApprovalId::new();
        if !approvals.knows(&id) {
            return id;
        }
        debug!(approval_id = %id, "Approval ID collision, regenerating");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceApprovalStatus;
    use crate::tier::{Tier, TierLadder};
    use tempfile::TempDir;

    fn step(tier: Tier) -> TierStep {
        *TierLadder::default().step_from(tier).unwrap()
    }

    fn settings() -> WorkflowSettings {
        WorkflowSettings {
            require_approver_name: true,
            config_label: Some("test.json".to_string()),
        }
    }

    fn workflow_with_device(temp: &TempDir, count: u64) -> ApprovalWorkflow {
        let paths = StorePaths::in_dir(temp.path());
        let mut wf = ApprovalWorkflow::open(&paths, settings(), Utc::now(), ScanState::default).unwrap();
        let mut device = DeviceState::new(Tier::Hours24, Utc::now(), Utc::now());
        device.count = count;
        wf.state_mut().devices.insert("DEV1".to_string(), device);
        wf
    }

    #[test]
    fn stage_freezes_device_and_snapshots_count() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 260);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();

        assert_eq!(request.unit_count, 260);
        assert_eq!(request.proposed_tier, Tier::Hours12);
        assert_eq!(request.config_file.as_deref(), Some("test.json"));
        let device = wf.state().device("DEV1").unwrap();
        assert!(device.is_pending());
        assert_eq!(device.pending_approval_id.as_ref(), Some(&request.id));

        let again = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now());
        assert!(matches!(again, Err(BurninError::InvalidState(_))));
    }

    #[test]
    fn resolve_requires_approver_name() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 260);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();

        let err = wf.resolve(&request.id, Decision::Approve, "  ", Utc::now()).unwrap_err();
        assert!(matches!(err, BurninError::InvalidApprover));
        assert!(wf.approvals().pending.contains_key(&request.id));
        assert!(wf.state().device("DEV1").unwrap().is_pending());
    }

    #[test]
    fn reject_keeps_tier_and_resets_count() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 300);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();
        wf.commit().unwrap();

        let resolved = wf.resolve(&request.id, Decision::Reject, "bob", Utc::now()).unwrap();
        assert_eq!(resolved.status, RequestStatus::Reject);
        let device = wf.state().device("DEV1").unwrap();
        assert_eq!(device.current_tier, Tier::Hours24);
        assert_eq!(device.count, 0);
        assert_eq!(device.approval_status, DeviceApprovalStatus::Rejected);
        assert!(device.pending_approval_id.is_none());
    }

    #[test]
    fn persistence_failure_leaves_memory_untouched() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 300);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();
        wf.commit().unwrap();

        // Replace the approvals document with a non-empty directory.
        let approvals_path = temp.path().join("pending_approvals.json");
        std::fs::remove_file(&approvals_path).unwrap();
        std::fs::create_dir(&approvals_path).unwrap();
        std::fs::write(approvals_path.join("blocker"), "x").unwrap();

        let err = wf.resolve(&request.id, Decision::Approve, "alice", Utc::now()).unwrap_err();
        assert!(matches!(err, BurninError::Persistence { .. }));
        assert!(wf.approvals().pending.contains_key(&request.id));
        let device = wf.state().device("DEV1").unwrap();
        assert!(device.is_pending());
        assert_eq!(device.count, 300);
    }

    #[test]
    fn failed_state_write_restores_approvals_document() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(temp.path());
        let mut wf = workflow_with_device(&temp, 300);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();
        wf.commit().unwrap();
        let approvals_before = std::fs::read_to_string(paths.approval_store().path()).unwrap();

        // Approvals write succeeds, state write cannot replace a non-empty directory.
        let state_path = paths.state_store().path().to_path_buf();
        let state_before = std::fs::read(&state_path).unwrap();
        std::fs::remove_file(&state_path).unwrap();
        std::fs::create_dir(&state_path).unwrap();
        std::fs::write(state_path.join("blocker"), "x").unwrap();

        let err = wf.resolve(&request.id, Decision::Approve, "alice", Utc::now()).unwrap_err();
        assert!(matches!(err, BurninError::Persistence { .. }));
        assert_eq!(
            std::fs::read_to_string(paths.approval_store().path()).unwrap(),
            approvals_before
        );

        // Reopening finds the request still open; nothing is applied behind the caller's back.
        std::fs::remove_dir_all(&state_path).unwrap();
        std::fs::write(&state_path, state_before).unwrap();
        let reopened = ApprovalWorkflow::open(&paths, settings(), Utc::now(), ScanState::default).unwrap();
        assert!(reopened.approvals().pending.contains_key(&request.id));
        let device = reopened.state().device("DEV1").unwrap();
        assert!(device.is_pending());
        assert_eq!(device.current_tier, Tier::Hours24);
        assert_eq!(device.count, 300);
    }

    #[test]
    fn reconcile_applies_decision_recorded_only_in_history() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 300);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();

        // Simulate a crash after the approvals write of an approval.
        let mut decided = wf.approvals.pending.remove(&request.id).unwrap();
        decided.record_decision(Decision::Approve, "alice", Utc::now());
        wf.approvals.history.push(decided);

        assert_eq!(wf.reconcile(Utc::now()), 1);
        let device = wf.state().device("DEV1").unwrap();
        assert_eq!(device.current_tier, Tier::Hours12);
        assert_eq!(device.count, 0);
        assert_eq!(device.approval_status, DeviceApprovalStatus::Approved);
        assert_eq!(wf.reconcile(Utc::now()), 0);
    }

    #[test]
    fn reconcile_relinks_open_request() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 300);
        let request = wf.stage_request("DEV1", &step(Tier::Hours24), Utc::now()).unwrap();
        wf.state_mut().device_mut("DEV1").unwrap().clear_pending();

        assert_eq!(wf.reconcile(Utc::now()), 1);
        let device = wf.state().device("DEV1").unwrap();
        assert!(device.is_pending());
        assert_eq!(device.pending_approval_id.as_ref(), Some(&request.id));
    }

    #[test]
    fn reconcile_clears_unknown_link_and_keeps_count() {
        let temp = TempDir::new().unwrap();
        let mut wf = workflow_with_device(&temp, 300);
        wf.state_mut()
            .device_mut("DEV1")
            .unwrap()
            .mark_pending(ApprovalId::parse("deadbeef").unwrap());

        assert_eq!(wf.reconcile(Utc::now()), 1);
        let device = wf.state().device("DEV1").unwrap();
        assert_eq!(device.approval_status, DeviceApprovalStatus::None);
        assert_eq!(device.count, 300);
    }

    #[test]
    fn open_persists_repairs() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(temp.path());
        {
            let mut wf = workflow_with_device(&temp, 300);
            wf.state_mut()
                .device_mut("DEV1")
                .unwrap()
                .mark_pending(ApprovalId::parse("deadbeef").unwrap());
            paths.state_store().save(wf.state()).unwrap();
        }

        ApprovalWorkflow::open(&paths, settings(), Utc::now(), ScanState::default).unwrap();
        let on_disk = paths.state_store().load().unwrap().unwrap();
        assert!(!on_disk.device("DEV1").unwrap().is_pending());
    }
}
