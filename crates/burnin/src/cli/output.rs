//! Terminal rendering shared by the commands: tables, instants, progress bars
//! and status colors.

use anyhow::Result;
use burnin_core::{DeviceApprovalStatus, RequestStatus};
use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Pretty-print any serializable value to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Local wall-clock time, second precision.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_optional(instant: Option<DateTime<Utc>>) -> String {
    instant.map(format_instant).unwrap_or_else(|| "never".to_string())
}

const AGO_UNITS: [(i64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

/// "5 minutes ago" style for the last week, a local date after that.
pub fn format_ago(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - instant).num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    if secs >= 7 * 86_400 {
        return instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
    }
    let (size, unit) = AGO_UNITS
        .iter()
        .copied()
        .find(|(size, _)| secs >= *size)
        .unwrap_or((1, "second"));
    let n = secs / size;
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

/// Fixed-width bar for a 0-100 percentage.
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

fn table_with_header(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = table_with_header(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Like `print_table`, with an optional foreground color per cell.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = table_with_header(headers);
    for row in rows {
        table.add_row(row.into_iter().map(|(text, color)| match color {
            Some(color) => Cell::new(text).fg(color),
            None => Cell::new(text),
        }));
    }
    println!("{}", table);
}

pub fn color_for_device_status(status: DeviceApprovalStatus) -> Option<Color> {
    match status {
        DeviceApprovalStatus::None => None,
        DeviceApprovalStatus::PendingApproval => Some(Color::Yellow),
        DeviceApprovalStatus::Approved => Some(Color::Green),
        DeviceApprovalStatus::Rejected => Some(Color::Red),
    }
}

pub fn color_for_request_status(status: RequestStatus) -> Color {
    match status {
        RequestStatus::Pending => Color::Yellow,
        RequestStatus::Approve => Color::Green,
        RequestStatus::Reject => Color::Red,
    }
}
