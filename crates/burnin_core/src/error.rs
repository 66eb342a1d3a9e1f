//! Error types for the burn-in core

use burnin_ids::ApprovalId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Burn-in core error type
#[derive(Error, Debug)]
pub enum BurninError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O failure outside the inbox scan (inbox failures degrade to zero files).
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Approval not found: {0}")]
    NotFound(ApprovalId),

    /// A state document could not be written; nothing was committed.
    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State store is locked by another process: {0}")]
    Locked(PathBuf),

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Approver name is required")]
    InvalidApprover,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BurninError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// True for errors that leave the stores untouched and only concern one request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BurninError>;
