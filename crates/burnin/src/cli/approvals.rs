//! `burnin approvals`: list, history, approve, reject.

use super::explain;
use super::output::{color_for_request_status, format_instant, print_json, print_table, print_table_colored};
use anyhow::{bail, Result};
use burnin_core::{ApprovalId, ApprovalRequest, ApprovalService, Config, Decision};
use chrono::Local;
use comfy_table::Color;

pub fn run_list(config: &Config, json: bool) -> Result<()> {
    let pending = ApprovalService::new(config).list_pending().map_err(explain)?;
    if json {
        return print_json(&pending);
    }
    if pending.is_empty() {
        println!("No pending approval requests.");
        return Ok(());
    }

    let rows = pending
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.device_name.clone(),
                r.transition_label(),
                r.unit_count.to_string(),
                format_instant(r.request_date),
            ]
        })
        .collect();
    print_table(&["ID", "Device", "Transition", "Units", "Requested"], rows);
    println!("{} pending request(s)", pending.len());
    Ok(())
}

pub fn run_history(config: &Config, json: bool) -> Result<()> {
    let service = ApprovalService::new(config);
    let history = service.history().map_err(explain)?;
    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        println!("No decided approval requests.");
        return Ok(());
    }

    let rows = history.iter().map(history_row).collect();
    print_table_colored(
        &["ID", "Device", "Transition", "Units", "Decision", "Approver", "Decided"],
        rows,
    );

    let records = service.records_snapshot().map_err(explain)?;
    let today = Local::now().date_naive();
    println!(
        "Today: {} approved, {} rejected",
        records.decided_on(today, Decision::Approve),
        records.decided_on(today, Decision::Reject)
    );
    Ok(())
}

fn history_row(r: &ApprovalRequest) -> Vec<(String, Option<Color>)> {
    vec![
        (r.id.to_string(), None),
        (r.device_name.clone(), None),
        (r.transition_label(), None),
        (r.unit_count.to_string(), None),
        (format!("{:?}", r.status).to_uppercase(), Some(color_for_request_status(r.status))),
        (r.approver.clone().unwrap_or_default(), None),
        (r.decision_date.map(format_instant).unwrap_or_default(), None),
    ]
}

/// Approve or reject one or more requests.
///
/// A single id fails loudly; several ids are resolved best effort and the
/// command fails afterwards if any of them did.
pub fn run_resolve(
    config: &Config,
    ids: &[String],
    decision: Decision,
    approver: Option<&str>,
    json: bool,
) -> Result<()> {
    let service = ApprovalService::new(config);
    let approver = approver.unwrap_or("");

    if let [single] = ids {
        let id = ApprovalId::parse(single)?;
        let resolved = service.resolve(&id, decision, approver).map_err(explain)?;
        if json {
            return print_json(&resolved);
        }
        print_resolved(&resolved, decision);
        return Ok(());
    }

    let outcome = service.resolve_many(ids, decision, approver).map_err(explain)?;
    if json {
        print_json(&outcome)?;
    } else {
        for resolved in &outcome.succeeded {
            print_resolved(resolved, decision);
        }
        for failure in &outcome.failed {
            eprintln!("FAILED {}: {}", failure.id, failure.reason);
        }
        println!(
            "{} {}, {} failed",
            outcome.succeeded_count(),
            decision.verb(),
            outcome.failed_count()
        );
    }

    if !outcome.all_succeeded() {
        bail!("{} of {} request(s) could not be {}", outcome.failed_count(), ids.len(), decision.verb());
    }
    Ok(())
}

fn print_resolved(request: &ApprovalRequest, decision: Decision) {
    println!(
        "{} {} ({} {}, {} units) by {}",
        request.id,
        decision.verb(),
        request.device_name,
        request.transition_label(),
        request.unit_count,
        request.approver.as_deref().unwrap_or("-")
    );
}
