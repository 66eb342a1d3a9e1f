//! Approval surface for front ends (CLI, dashboard).
//!
//! Listing reads the approvals document as it is on disk. Resolution takes
//! the store lock without waiting: while a scan holds it, a decision fails
//! with `Locked` and can be retried.

use crate::approval::{ApprovalRecords, ApprovalRequest, Decision};
use crate::config::Config;
use crate::device::ScanState;
use crate::error::Result;
use crate::lock::{try_lock_exclusive, StoreLockGuard};
use crate::store::StorePaths;
use crate::workflow::{ApprovalWorkflow, BulkOutcome, WorkflowSettings};
use burnin_ids::ApprovalId;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct ApprovalService {
    paths: StorePaths,
    settings: WorkflowSettings,
}

impl ApprovalService {
    pub fn new(config: &Config) -> Self {
        Self::with_paths(config.store_paths(), WorkflowSettings::from_config(config))
    }

    pub fn with_paths(paths: StorePaths, settings: WorkflowSettings) -> Self {
        Self { paths, settings }
    }

    fn records(&self) -> Result<ApprovalRecords> {
        self.paths.approval_store().load_or_default()
    }

    /// Open requests, oldest first.
    pub fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self.records()?.pending_sorted().into_iter().cloned().collect())
    }

    /// Decided requests, newest first.
    pub fn history(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .records()?
            .history_newest_first()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn records_snapshot(&self) -> Result<ApprovalRecords> {
        self.records()
    }

    fn open_locked(&self) -> Result<(StoreLockGuard, ApprovalWorkflow)> {
        let guard = try_lock_exclusive(&self.paths.state)?;
        let workflow = ApprovalWorkflow::open(
            &self.paths,
            self.settings.clone(),
            Utc::now(),
            ScanState::default,
        )?;
        Ok((guard, workflow))
    }

    /// Resolve one request. `NotFound` if it is not pending.
    pub fn resolve(&self, id: &ApprovalId, decision: Decision, approver: &str) -> Result<ApprovalRequest> {
        let (_guard, mut workflow) = self.open_locked()?;
        workflow.resolve(id, decision, approver, Utc::now())
    }

    /// Resolve several requests under one lock, best effort.
    ///
    /// Only a failure to lock or load the stores is an error; per-id failures
    /// are in the outcome.
    pub fn resolve_many<S: AsRef<str>>(
        &self,
        ids: &[S],
        decision: Decision,
        approver: &str,
    ) -> Result<BulkOutcome> {
        let (_guard, mut workflow) = self.open_locked()?;
        Ok(workflow.resolve_many(ids, decision, approver, Utc::now()))
    }
}
