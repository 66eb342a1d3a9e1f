//! Shared logging utilities for the burn-in counter binaries.

mod rolling;

use anyhow::{Context, Result};
use rolling::{Retention, RotatingLog, SharedLog};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_LEVEL: &str = "info";
const RETENTION: Retention = Retention {
    files: 5,
    bytes_per_file: 10 * 1024 * 1024,
};

/// Logging configuration shared by burn-in binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Level used for the burn-in crates when `RUST_LOG` is unset
    /// (e.g. the `logging.level` key of the counter config).
    pub default_level: Option<&'a str>,
    /// Override for the log directory; defaults to `logs_dir()`.
    pub log_dir: Option<PathBuf>,
}

/// Build the default filter directive for the burn-in crates.
pub fn default_filter(level: Option<&str>) -> String {
    let level = level
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| matches!(l.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    format!("burnin={level},burnin_core={level}")
}

/// Install the global subscriber: a non-ANSI rotating file plus stderr.
///
/// `RUST_LOG` overrides the default directive for both layers; `verbose`
/// forces the console layer to debug.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir(),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;
    let file_writer = RotatingLog::open(&log_dir, &sanitize_name(config.app_name), RETENTION)
        .map(SharedLog::new)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;

    let directive = default_filter(config.default_level);
    let from_env_or_default =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
    let console_filter = if config.verbose {
        EnvFilter::new(default_filter(Some("debug")))
    } else {
        from_env_or_default()
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(from_env_or_default());
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Root for per-user counter files: `$BURNIN_HOME`, else `~/.burnin`, else
/// `./.burnin` when no home directory is known.
pub fn burnin_home() -> PathBuf {
    match std::env::var_os("BURNIN_HOME") {
        Some(path) => PathBuf::from(path),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".burnin"),
    }
}

pub fn logs_dir() -> PathBuf {
    burnin_home().join("logs")
}

/// Log file stem for a config file: `burnin_<config stem>`, so runs against
/// different configs land in different files.
pub fn log_name_for_config(config_path: &Path) -> String {
    let stem = config_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "config".to_string());
    sanitize_name(&format!("burnin_{stem}"))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
