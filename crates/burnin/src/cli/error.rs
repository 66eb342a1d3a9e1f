//! User-facing failures for the `burnin` commands.
//!
//! A `HelpfulError` prints what failed, the situation it failed in and the
//! commands most likely to fix it, one `TRY:` line each.

use burnin_core::lock::LockHolder;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a `TRY:` line.
    pub fn try_this(mut self, suggestion: impl fmt::Display) -> Self {
        self.suggestions.push(format!("TRY: {}", suggestion));
        self
    }

    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Config file not found: {}", path.display()))
            .with_context("The counter needs a configuration naming the scan path and devices")
            .try_this("burnin --config <PATH> ...")
            .try_this("export BURNIN_CONFIG=<PATH>")
            .try_this(format_args!("ls -la {}", path.display()))
    }

    pub fn invalid_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid configuration: {}", path.display()))
            .with_context(details)
            .try_this("Check the JSON (or .toml) syntax")
            .try_this("Dates look like 2024-03-01 or 2024-03-01T08:00:00")
            .try_this("Tiers are named 24h, 12h, 6h, 3h, 2h")
    }

    pub fn approval_not_found(id: &str) -> Self {
        Self::new(format!("Approval request not found: {}", id))
            .with_context("Only pending requests can be decided; it may already be in history")
            .try_this("burnin approvals list")
            .try_this("burnin approvals history")
    }

    pub fn approver_required() -> Self {
        Self::new("Approver name is required")
            .with_context("approval_settings.require_approver_name is enabled")
            .try_this("--approver <NAME> (or export BURNIN_APPROVER=<NAME>)")
    }

    pub fn store_locked(path: &Path, holder: Option<LockHolder>) -> Self {
        let context = match holder {
            Some(h) => format!("Process {} has been updating the state documents since {}", h.pid, h.since),
            None => "Another scan or approval is updating the state documents".to_string(),
        };
        Self::new(format!("State store is busy: {}", path.display()))
            .with_context(context)
            .try_this("Wait for the other run to finish, then retry")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;
        if let Some(context) = &self.context {
            writeln!(f, "CONTEXT: {}", context)?;
        }
        if !self.suggestions.is_empty() {
            writeln!(f)?;
        }
        self.suggestions.iter().try_for_each(|s| writeln!(f, "  {}", s))
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn display_lists_context_and_suggestions() {
        let text = HelpfulError::new("Scan failed")
            .with_context("Reading DEV1")
            .try_this("burnin status")
            .to_string();
        assert!(text.starts_with("ERROR: Scan failed\n"));
        assert!(text.contains("CONTEXT: Reading DEV1"));
        assert!(text.contains("  TRY: burnin status"));
    }

    #[test]
    fn missing_config_mentions_env_var() {
        let err = HelpfulError::config_not_found(Path::new("/etc/burnin/counter.json"));
        assert!(err.message.contains("/etc/burnin/counter.json"));
        assert!(err.suggestions.iter().any(|s| s.contains("BURNIN_CONFIG")));
    }

    #[test]
    fn unknown_approval_points_at_listings() {
        let err = HelpfulError::approval_not_found("deadbeef");
        assert!(err.to_string().contains("deadbeef"));
        assert!(err.suggestions.iter().any(|s| s.contains("approvals list")));
    }

    #[test]
    fn busy_store_names_holder() {
        let holder = LockHolder {
            pid: 4242,
            since: Utc::now(),
            command: None,
        };
        let err = HelpfulError::store_locked(Path::new("state.json"), Some(holder));
        assert!(err.context.unwrap_or_default().contains("4242"));
    }
}
