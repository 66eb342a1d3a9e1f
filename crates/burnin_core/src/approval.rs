//! Approval requests and the pending + history document.
//!
//! A request snapshots one proposed tier transition. It lives in the pending
//! set until a decision is recorded, then moves to the history log and never
//! changes again.

use crate::tier::Tier;
use burnin_ids::ApprovalId;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name recorded in `requested_by` for requests raised by the scanner.
pub const REQUESTER: &str = "burnin_scanner";

/// Request life cycle status. `Approve` and `Reject` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approve,
    Reject,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A human decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Reject => "REJECT",
        }
    }

    /// Past tense, for log lines and CLI output.
    pub fn verb(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

impl From<Decision> for RequestStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => RequestStatus::Approve,
            Decision::Reject => RequestStatus::Reject,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" | "APPROVED" => Ok(Decision::Approve),
            "REJECT" | "REJECTED" => Ok(Decision::Reject),
            other => Err(format!("Invalid decision '{}' (expected APPROVE or REJECT)", other)),
        }
    }
}

/// One proposed tier transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    #[serde(rename = "approval_id")]
    pub id: ApprovalId,
    pub device_name: String,
    pub current_tier: Tier,
    pub proposed_tier: Tier,
    /// Device count at the moment of the request
    pub unit_count: u64,
    pub request_date: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(default = "default_requester")]
    pub requested_by: String,
    #[serde(
        rename = "device_production_start_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub production_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

fn default_requester() -> String {
    REQUESTER.to_string()
}

impl ApprovalRequest {
    pub fn new(
        id: ApprovalId,
        device_name: impl Into<String>,
        current_tier: Tier,
        proposed_tier: Tier,
        unit_count: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            device_name: device_name.into(),
            current_tier,
            proposed_tier,
            unit_count,
            request_date: now,
            status: RequestStatus::Pending,
            decision_date: None,
            approver: None,
            requested_by: default_requester(),
            production_start_date: None,
            config_file: None,
        }
    }

    /// Record the decision. Only meaningful on a pending request.
    pub(crate) fn record_decision(&mut self, decision: Decision, approver: &str, now: DateTime<Utc>) {
        self.status = decision.into();
        self.decision_date = Some(now);
        self.approver = Some(approver.to_string());
    }

    pub fn transition_label(&self) -> String {
        format!("{} -> {}", self.current_tier, self.proposed_tier)
    }
}

/// The approval document: open requests by id plus the decided log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecords {
    #[serde(default)]
    pub pending: BTreeMap<ApprovalId, ApprovalRequest>,
    #[serde(default)]
    pub history: Vec<ApprovalRequest>,
}

impl ApprovalRecords {
    /// True if `id` was ever issued (pending or decided).
    pub fn knows(&self, id: &ApprovalId) -> bool {
        self.pending.contains_key(id) || self.history.iter().any(|r| &r.id == id)
    }

    pub fn history_entry(&self, id: &ApprovalId) -> Option<&ApprovalRequest> {
        self.history.iter().rev().find(|r| &r.id == id)
    }

    /// The open request for a device, if any.
    pub fn pending_for_device(&self, device_name: &str) -> Option<&ApprovalRequest> {
        self.pending.values().find(|r| r.device_name == device_name)
    }

    /// Pending requests, oldest first.
    pub fn pending_sorted(&self) -> Vec<&ApprovalRequest> {
        let mut pending: Vec<&ApprovalRequest> = self.pending.values().collect();
        pending.sort_by(|a, b| a.request_date.cmp(&b.request_date).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    /// Decided requests, newest first.
    pub fn history_newest_first(&self) -> Vec<&ApprovalRequest> {
        let mut history: Vec<&ApprovalRequest> = self.history.iter().collect();
        history.sort_by(|a, b| b.decision_date.cmp(&a.decision_date));
        history
    }

    /// Number of `decision` outcomes recorded on the local calendar `day`.
    pub fn decided_on(&self, day: NaiveDate, decision: Decision) -> usize {
        let status = RequestStatus::from(decision);
        self.history
            .iter()
            .filter(|r| r.status == status)
            .filter_map(|r| r.decision_date)
            .filter(|d| d.with_timezone(&Local).date_naive() == day)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn request(id: &str, device: &str) -> ApprovalRequest {
        ApprovalRequest::new(
            ApprovalId::parse(id).unwrap(),
            device,
            Tier::Hours24,
            Tier::Hours12,
            250,
            now(),
        )
    }

    #[test]
    fn decision_parsing() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approve);
        assert_eq!("REJECT".parse::<Decision>().unwrap(), Decision::Reject);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn record_decision_sets_terminal_fields() {
        let mut r = request("0000000a", "DEV1");
        assert!(!r.status.is_terminal());
        r.record_decision(Decision::Approve, "alice", now());
        assert_eq!(r.status, RequestStatus::Approve);
        assert!(r.status.is_terminal());
        assert_eq!(r.approver.as_deref(), Some("alice"));
        assert_eq!(r.decision_date, Some(now()));
    }

    #[test]
    fn document_layout() {
        let mut records = ApprovalRecords::default();
        let r = request("0000000a", "DEV1");
        records.pending.insert(r.id.clone(), r);

        let json = serde_json::to_value(&records).unwrap();
        let entry = &json["pending"]["0000000a"];
        assert_eq!(entry["approval_id"], "0000000a");
        assert_eq!(entry["status"], "PENDING");
        assert_eq!(entry["current_tier"], "24h");
        assert_eq!(entry["proposed_tier"], "12h");
        assert!(json["history"].as_array().unwrap().is_empty());

        let back: ApprovalRecords = serde_json::from_value(json).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn lookups() {
        let mut records = ApprovalRecords::default();
        let open = request("0000000a", "DEV1");
        records.pending.insert(open.id.clone(), open);
        let mut done = request("0000000b", "DEV2");
        done.record_decision(Decision::Reject, "bob", now());
        records.history.push(done);

        assert!(records.knows(&ApprovalId::parse("0000000a").unwrap()));
        assert!(records.knows(&ApprovalId::parse("0000000b").unwrap()));
        assert!(!records.knows(&ApprovalId::parse("0000000c").unwrap()));
        assert!(records.pending_for_device("DEV1").is_some());
        assert!(records.pending_for_device("DEV2").is_none());
        let local_day = now().with_timezone(&Local).date_naive();
        assert_eq!(records.decided_on(local_day, Decision::Reject), 1);
        assert_eq!(records.decided_on(local_day, Decision::Approve), 0);
    }

    #[test]
    fn decided_on_uses_local_calendar_day() {
        let mut records = ApprovalRecords::default();
        let decided_at = now();
        let mut done = request("0000000d", "DEV1");
        done.record_decision(Decision::Approve, "alice", decided_at);
        records.history.push(done);

        let local_day = decided_at.with_timezone(&Local).date_naive();
        assert_eq!(records.decided_on(local_day, Decision::Approve), 1);
        assert_eq!(records.decided_on(local_day.pred_opt().unwrap(), Decision::Approve), 0);
        assert_eq!(records.decided_on(local_day.succ_opt().unwrap(), Decision::Approve), 0);
    }
}
