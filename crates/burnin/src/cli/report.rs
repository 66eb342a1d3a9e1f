//! Read-only views: `burnin report`, `burnin status`, `burnin devices`.

use super::explain;
use super::output::{
    color_for_device_status, format_ago, format_optional, print_json, print_table, print_table_colored,
    progress_bar,
};
use anyhow::Result;
use burnin_core::{Config, Hold, ScanReport, Scanner};
use chrono::Utc;

pub fn run_report(config: Config, json: bool) -> Result<()> {
    let report = Scanner::from_config(config).map_err(explain)?.report().map_err(explain)?;
    if json {
        return print_json(&report);
    }
    println!("Last scan: {}", format_optional(report.scan_time));
    println!();
    print_report(&report);
    Ok(())
}

/// Device table, tier histogram and pending count.
pub fn print_report(report: &ScanReport) {
    if report.devices.is_empty() {
        println!("No devices tracked yet. Run 'burnin scan' first.");
    } else {
        let rows = report
            .devices
            .iter()
            .map(|d| {
                vec![
                    (d.device.clone(), None),
                    (d.tier.to_string(), None),
                    (d.count.to_string(), None),
                    (d.approval_status.to_string(), color_for_device_status(d.approval_status)),
                    (d.total_files.to_string(), None),
                    (d.historical_files.to_string(), None),
                ]
            })
            .collect();
        print_table_colored(&["Device", "Tier", "Count", "Status", "Total", "Historical"], rows);
    }

    let summary = report
        .tier_summary
        .iter()
        .map(|(tier, n)| format!("{}: {}", tier, n))
        .collect::<Vec<_>>()
        .join("  ");
    println!("Tiers    {}", summary);
    println!("Pending approvals: {}", report.pending_approvals);
    println!("Config: {} ({})", report.config_file, report.run_mode.as_str());
}

pub fn run_status(config: Config, json: bool) -> Result<()> {
    let status = Scanner::from_config(config).map_err(explain)?.status().map_err(explain)?;
    if json {
        return print_json(&status);
    }

    let last_scan = match status.last_scan {
        Some(at) => format!("{} ({})", format_optional(Some(at)), format_ago(at, Utc::now())),
        None => "never".to_string(),
    };
    print_table(
        &["Field", "Value"],
        vec![
            vec!["Config".to_string(), status.config_file.clone()],
            vec!["Mode".to_string(), status.run_mode.as_str().to_string()],
            vec!["Last scan".to_string(), last_scan],
            vec!["Bootstrap completed".to_string(), status.bootstrap_completed.to_string()],
            vec![
                "Devices (enabled/configured)".to_string(),
                format!("{}/{}", status.devices_enabled, status.devices_configured),
            ],
            vec!["Devices tracked".to_string(), status.devices_tracked.to_string()],
            vec!["Pending approvals".to_string(), status.pending_approvals.to_string()],
            vec!["Approved today".to_string(), status.approved_today.to_string()],
            vec!["Rejected today".to_string(), status.rejected_today.to_string()],
        ],
    );
    Ok(())
}

pub fn run_devices(config: Config, json: bool) -> Result<()> {
    let progress = Scanner::from_config(config).map_err(explain)?.progress().map_err(explain)?;
    if json {
        return print_json(&progress);
    }
    if progress.is_empty() {
        println!("No devices tracked yet. Run 'burnin scan' first.");
        return Ok(());
    }

    let rows = progress
        .iter()
        .map(|p| {
            let next = match (p.next_tier, p.requirement) {
                (Some(tier), Some(req)) => format!("{} @ {}", tier, req),
                _ => "final".to_string(),
            };
            let note = p.blocked.map(hold_label).unwrap_or_default();
            vec![
                (p.device.clone(), None),
                (p.tier.to_string(), None),
                (next, None),
                (p.count.to_string(), None),
                (
                    p.remaining.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    None,
                ),
                (format!("{} {:5.1}%", progress_bar(p.percent, 20), p.percent), None),
                (p.approval_status.to_string(), color_for_device_status(p.approval_status)),
                (note, None),
            ]
        })
        .collect();
    print_table_colored(
        &["Device", "Tier", "Next", "Count", "Remaining", "Progress", "Status", "Held"],
        rows,
    );
    Ok(())
}

fn hold_label(hold: Hold) -> String {
    match hold {
        Hold::Pending => "awaiting approval".to_string(),
        Hold::Terminal => "final tier".to_string(),
        Hold::Excluded => "tier excluded".to_string(),
        Hold::FinalTierExcluded => "final tier excluded".to_string(),
        Hold::BelowThreshold { .. } => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_needs_no_note() {
        assert_eq!(hold_label(Hold::BelowThreshold { remaining: 4 }), "");
        assert_eq!(hold_label(Hold::Pending), "awaiting approval");
    }
}
