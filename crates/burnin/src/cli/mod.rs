//! CLI command handlers for the burn-in counter
//!
//! Each subcommand is a thin client of `burnin_core`: the scanner for scan
//! and report views, the approval service for everything under `approvals`.

pub mod approvals;
pub mod error;
pub mod output;
pub mod report;
pub mod scan;

use anyhow::Result;
use burnin_core::{BurninError, Config};
use error::HelpfulError;
use std::path::Path;

/// Load and validate the counter configuration.
///
/// Runs before logging is installed, so failures are reported through the
/// returned error only.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(HelpfulError::config_not_found(path).into());
    }
    let config = Config::load(path).map_err(|e| HelpfulError::invalid_config(path, &e.to_string()))?;
    Ok(config)
}

/// Turn core errors a user can act on into helpful ones.
pub fn explain(err: BurninError) -> anyhow::Error {
    match err {
        BurninError::NotFound(id) => HelpfulError::approval_not_found(id.as_str()).into(),
        BurninError::InvalidApprover => HelpfulError::approver_required().into(),
        BurninError::Locked(path) => {
            let holder = burnin_core::lock::current_holder(&path);
            HelpfulError::store_locked(&path, holder).into()
        }
        other => other.into(),
    }
}
