//! State Store / Approval Store - whole-document JSON persistence
//!
//! Each document is held in memory, mutated there, and rewritten in full on
//! save through a temp file + rename, so readers only ever see a complete
//! previous or complete new document.
//!
//! # Storage Format
//!
//! ```text
//! state.json              ScanState (last scan, bootstrap flag, devices)
//! pending_approvals.json  ApprovalRecords (pending map + history log)
//! state.json.lock         advisory lock shared by scanner and approval surface
//! ```

use crate::approval::ApprovalRecords;
use crate::device::ScanState;
use crate::error::{BurninError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locations of the two persisted documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub state: PathBuf,
    pub approvals: PathBuf,
}

impl StorePaths {
    pub fn new(state: impl Into<PathBuf>, approvals: impl Into<PathBuf>) -> Self {
        Self {
            state: state.into(),
            approvals: approvals.into(),
        }
    }

    /// Both documents in one directory with their default names.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("state.json"), dir.join("pending_approvals.json"))
    }

    pub fn state_store(&self) -> JsonStore<ScanState> {
        JsonStore::new(self.state.clone())
    }

    pub fn approval_store(&self) -> JsonStore<ApprovalRecords> {
        JsonStore::new(self.approvals.clone())
    }
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, `None` if it has never been written.
    pub fn load(&self) -> Result<Option<T>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BurninError::io(&self.path, e)),
        };

        let doc = serde_json::from_str(&json).map_err(|source| BurninError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Loaded document");
        Ok(Some(doc))
    }

    /// Rewrite the whole document atomically.
    pub fn save(&self, doc: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(doc)?;
        atomic_write(&self.path, &json).map_err(|e| BurninError::persistence(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = json.len(), "Saved document");
        Ok(())
    }
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn load_or_default(&self) -> Result<T> {
        Ok(self.load()?.unwrap_or_default())
    }
}

/// Atomic write via temp file + rename in the target's directory.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let temp_path = parent.join(format!(".{}.tmp_{}", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::tier::Tier;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn missing_document_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(temp.path());
        assert!(paths.state_store().load().unwrap().is_none());
        assert_eq!(
            paths.approval_store().load_or_default().unwrap(),
            ApprovalRecords::default()
        );
    }

    #[test]
    fn save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = StorePaths::in_dir(temp.path()).state_store();

        let mut state = ScanState::default();
        state.bootstrap_completed = true;
        state.devices.insert(
            "DEV1".to_string(),
            DeviceState::new(Tier::Hours12, Utc::now(), Utc::now()),
        );
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = StorePaths::in_dir(temp.path()).approval_store();
        store.save(&ApprovalRecords::default()).unwrap();
        store.save(&ApprovalRecords::default()).unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["pending_approvals.json".to_string()]);
    }

    #[test]
    fn save_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store: JsonStore<ScanState> = JsonStore::new(temp.path().join("a/b/state.json"));
        store.save(&ScanState::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_document_is_reported() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(temp.path());
        fs::write(&paths.state, "{ truncated").unwrap();
        let err = paths.state_store().load().unwrap_err();
        assert!(matches!(err, BurninError::Corrupt { .. }));
    }

    #[test]
    fn unwritable_target_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("state.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), "x").unwrap();

        let store: JsonStore<ScanState> = JsonStore::new(target);
        let err = store.save(&ScanState::default()).unwrap_err();
        assert!(matches!(err, BurninError::Persistence { .. }));
    }
}
