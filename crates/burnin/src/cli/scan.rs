//! `burnin scan`: one scan cycle over every enabled device.

use super::output::{color_for_device_status, format_instant, print_json, print_table_colored};
use super::report::print_report;
use super::explain;
use anyhow::Result;
use burnin_core::{Config, DeviceScanResult, InboxStatus, ScanReport, Scanner};
use comfy_table::Color;

pub fn run(config: Config, json: bool) -> Result<()> {
    let scanner = Scanner::from_config(config).map_err(explain)?;
    let report = scanner.run_scan().map_err(explain)?;

    if json {
        return print_json(&report);
    }
    print_scan(&report);
    Ok(())
}

fn print_scan(report: &ScanReport) {
    if report.devices_scanned == 0 {
        println!("No enabled devices in configuration; nothing scanned.");
        return;
    }

    println!(
        "Scan started {} ({} ms), {} device(s)",
        report.scan_time.map(format_instant).unwrap_or_default(),
        report.duration_ms.unwrap_or(0),
        report.devices_scanned
    );
    if report.bootstrap_applied {
        println!("Bootstrap mode applied: existing files recorded as historical.");
    }
    println!();

    let rows = report.scan_results.iter().map(scan_row).collect();
    print_table_colored(
        &["Device", "Tier", "Inbox", "Total", "Historical", "New", "Deferred", "Count", "Status", "Request"],
        rows,
    );

    if !report.requests_created.is_empty() {
        println!();
        for id in &report.requests_created {
            println!("Approval requested: {}", id);
        }
    }
    println!();
    print_report(report);
}

fn scan_row(result: &DeviceScanResult) -> Vec<(String, Option<Color>)> {
    let inbox_color = match result.inbox_status {
        InboxStatus::Ok => None,
        InboxStatus::Missing | InboxStatus::Unreadable => Some(Color::Red),
    };
    let inbox = match result.inbox_status {
        InboxStatus::Ok => "ok",
        InboxStatus::Missing => "missing",
        InboxStatus::Unreadable => "unreadable",
    };
    vec![
        (result.device.clone(), None),
        (result.tier.to_string(), None),
        (inbox.to_string(), inbox_color),
        (result.counts.total.to_string(), None),
        (result.counts.historical.to_string(), None),
        (result.counts.new.to_string(), None),
        (result.counts.deferred.to_string(), None),
        (result.count.to_string(), None),
        (
            result.approval_status.to_string(),
            color_for_device_status(result.approval_status),
        ),
        (
            result
                .requested
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            Some(Color::Yellow),
        ),
    ]
}
