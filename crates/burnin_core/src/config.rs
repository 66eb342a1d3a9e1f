//! Configuration for the burn-in counter
//!
//! The configuration is loaded once and passed by value into the scanner and
//! the approval service; nothing here is mutated at runtime.

use crate::error::{BurninError, Result};
use crate::filter::FileFilter;
use crate::store::StorePaths;
use crate::tier::{Tier, TierRequirements};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding one folder per device
    pub scan_path: PathBuf,

    /// Inbox folder inside each device folder
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: String,

    /// Device/scan state document
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Pending + history approval document
    #[serde(default = "default_approvals_file")]
    pub approvals_file: PathBuf,

    /// Where notification documents are dropped for the external mailer
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    #[serde(default)]
    pub production_settings: ProductionSettings,

    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,

    #[serde(default)]
    pub tier_requirements: TierRequirements,

    /// Tiers that never advance, for every device
    #[serde(default)]
    pub excluded_tiers: Vec<Tier>,

    #[serde(default)]
    pub file_filtering: FileFilteringConfig,

    #[serde(default)]
    pub email_settings: EmailSettings,

    #[serde(default)]
    pub approval_settings: ApprovalSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// File this config was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_inbox_dir() -> String {
    "BIU".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_approvals_file() -> PathBuf {
    PathBuf::from("pending_approvals.json")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionSettings {
    #[serde(default)]
    pub is_production: bool,

    #[serde(default)]
    pub local_test_mode: bool,

    /// Fallback production start for devices without their own date
    #[serde(default, deserialize_with = "deserialize_instant_opt")]
    pub production_start_date: Option<DateTime<Utc>>,

    /// Treat every file seen on the very first scan as historical
    #[serde(default)]
    pub bootstrap_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Tier the device is running when first tracked
    #[serde(default)]
    pub current_tier: Tier,

    #[serde(default, deserialize_with = "deserialize_instant_opt")]
    pub production_start_date: Option<DateTime<Utc>>,

    /// Stop this device one tier before the terminal tier
    #[serde(default, alias = "exclude_2h")]
    pub exclude_final_tier: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            current_tier: Tier::default(),
            production_start_date: None,
            exclude_final_tier: false,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilteringConfig {
    /// Allowed extensions (".txt" or "txt"); empty allows everything
    #[serde(default)]
    pub include_extensions: Vec<String>,

    /// Glob patterns matched against the file name
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub min_file_size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub recipients: Recipients,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipients {
    #[serde(default)]
    pub quality: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSettings {
    #[serde(default = "default_approval_url")]
    pub approval_url: String,

    #[serde(default = "default_true")]
    pub require_approver_name: bool,
}

fn default_approval_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            approval_url: default_approval_url(),
            require_approver_name: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How the counter was deployed, for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Development,
    Production,
    LocalTest,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
            RunMode::LocalTest => "local_test",
        }
    }
}

impl Config {
    /// Load configuration from a JSON or TOML file (by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BurninError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let mut config: Config = if is_toml {
            toml::from_str(&content).map_err(|e| {
                BurninError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                BurninError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        };

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_relative_paths(&base_dir);
        config.source_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document without touching the filesystem.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| BurninError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        for path in [
            &mut self.state_file,
            &mut self.approvals_file,
            &mut self.outbox_dir,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan_path.as_os_str().is_empty() {
            return Err(BurninError::Config("scan_path must not be empty".to_string()));
        }
        if self.inbox_dir.trim().is_empty() {
            return Err(BurninError::Config("inbox_dir must not be empty".to_string()));
        }

        let req = &self.tier_requirements;
        for (label, value) in [
            ("24h_to_12h", req.h24_to_h12),
            ("12h_to_6h", req.h12_to_h6),
            ("6h_to_3h", req.h6_to_h3),
            ("3h_to_2h", req.h3_to_h2),
        ] {
            if value == 0 {
                return Err(BurninError::Config(format!(
                    "tier_requirements.{} must be greater than zero",
                    label
                )));
            }
        }

        for name in self.devices.keys() {
            if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(BurninError::Config(format!("Invalid device name '{}'", name)));
            }
        }

        FileFilter::compile(&self.file_filtering)?;
        Ok(())
    }

    pub fn run_mode(&self) -> RunMode {
        if self.production_settings.local_test_mode {
            RunMode::LocalTest
        } else if self.production_settings.is_production {
            RunMode::Production
        } else {
            RunMode::Development
        }
    }

    /// Enabled devices in name order.
    pub fn enabled_devices(&self) -> impl Iterator<Item = (&String, &DeviceConfig)> {
        self.devices.iter().filter(|(_, device)| device.enabled)
    }

    /// `scan_path/<device>/<inbox_dir>`
    pub fn device_inbox(&self, device_name: &str) -> PathBuf {
        self.scan_path.join(device_name).join(&self.inbox_dir)
    }

    /// Device date, else global date, else `now`.
    pub fn production_start(&self, device_name: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(date) = self
            .devices
            .get(device_name)
            .and_then(|d| d.production_start_date)
        {
            return date;
        }
        if let Some(date) = self.production_settings.production_start_date {
            return date;
        }
        warn!(
            device = device_name,
            "No production start date configured, using current time"
        );
        now
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(self.state_file.clone(), self.approvals_file.clone())
    }

    pub fn source_label(&self) -> String {
        self.source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string())
    }
}

/// Parse an instant the way operators write them in config files.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (or with a space) in
/// local time, or a bare `YYYY-MM-DD` meaning local midnight.
pub fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("Invalid date '{}'", raw))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("Date '{}' does not exist in the local time zone", raw))
}

fn deserialize_instant_opt<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_instant(&s).map(Some).map_err(serde::de::Error::custom),
    }
}
