//! Identifier wrappers for the burn-in counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the hex prefix kept from a v4 UUID.
pub const SHORT_ID_LEN: usize = 8;

/// Why a string is not an `ApprovalId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    WrongLength(String),
    NotHex(String),
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(raw) => write!(
                f,
                "Invalid approval ID '{}': expected {} hex characters",
                raw, SHORT_ID_LEN
            ),
            Self::NotHex(raw) => write!(f, "Invalid approval ID '{}': not hexadecimal", raw),
        }
    }
}

impl std::error::Error for IdParseError {}

/// Approval request id: 8 lowercase hex characters from a v4 UUID.
///
/// Short enough to type at a prompt or paste into an approval link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(String);

impl ApprovalId {
    /// Fresh random id. Callers that need uniqueness against a store check
    /// for collisions themselves.
    pub fn new() -> Self {
        let mut hex = Uuid::new_v4().simple().to_string();
        hex.truncate(SHORT_ID_LEN);
        Self(hex)
    }

    /// Accepts surrounding whitespace and any case; stores lowercase.
    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        let value = value.trim();
        if value.len() != SHORT_ID_LEN {
            return Err(IdParseError::WrongLength(value.to_string()));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::NotHex(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ApprovalId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ApprovalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
