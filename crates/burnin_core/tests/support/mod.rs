//! Shared fixture: a scan root with device inboxes plus isolated state files.

#![allow(dead_code)]

use burnin_core::{Config, LogNotifier, Scanner};
use chrono::{DateTime, Duration, TimeZone, Utc};
use filetime::{set_file_mtime, FileTime};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    pub temp: TempDir,
    pub config: Config,
}

/// Production start used by every fixture device.
pub fn production_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// A fixed instant well after production start.
pub fn at(days: i64, hours: i64) -> DateTime<Utc> {
    production_start() + Duration::days(days) + Duration::hours(hours)
}

impl Fixture {
    /// `devices` is the config `devices` object; everything else is filled in.
    pub fn new(devices: Value) -> Self {
        Self::with(devices, json!({}))
    }

    /// `overrides` is merged into the top-level config object.
    pub fn with(devices: Value, overrides: Value) -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let root = temp.path();
        let mut doc = json!({
            "scan_path": root.join("devices"),
            "state_file": root.join("state.json"),
            "approvals_file": root.join("pending_approvals.json"),
            "outbox_dir": root.join("outbox"),
            "production_settings": {
                "production_start_date": production_start().to_rfc3339(),
            },
            "devices": devices,
        });
        if let (Some(base), Some(extra)) = (doc.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        let config = Config::from_json_str(&doc.to_string()).expect("valid fixture config");
        Self { temp, config }
    }

    pub fn inbox(&self, device: &str) -> PathBuf {
        let inbox = self.config.device_inbox(device);
        fs::create_dir_all(&inbox).expect("create inbox");
        inbox
    }

    /// Write `count` unit files stamped one second apart starting at `first`.
    pub fn add_units(&self, device: &str, prefix: &str, count: usize, first: DateTime<Utc>) {
        let inbox = self.inbox(device);
        for i in 0..count {
            let stamp = first + Duration::seconds(i as i64);
            write_stamped(&inbox.join(format!("{prefix}_{i:05}.txt")), stamp);
        }
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(self.config.clone(), Box::new(LogNotifier)).expect("scanner")
    }

    pub fn state_path(&self) -> &Path {
        &self.config.state_file
    }

    pub fn approvals_path(&self) -> &Path {
        &self.config.approvals_file
    }
}

pub fn write_stamped(path: &Path, stamp: DateTime<Utc>) {
    fs::write(path, "unit result").expect("write unit file");
    set_file_mtime(path, FileTime::from_unix_time(stamp.timestamp(), 0)).expect("set mtime");
}

/// One enabled device at 24h with default thresholds.
pub fn one_device() -> Value {
    json!({ "DEV1": { "enabled": true, "current_tier": "24h" } })
}
