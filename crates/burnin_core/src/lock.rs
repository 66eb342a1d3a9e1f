//! Cross-process exclusion for the two state documents.
//!
//! A scan and an approval decision both rewrite the state and approvals
//! documents whole. Each read-modify-write holds an `fs2` advisory lock on
//! `<state_file>.lock`; the holder's pid and start time are written next to it
//! in `<state_file>.lock.json` so a blocked run can say who it is waiting on.

use crate::error::{BurninError, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Who holds the lock, as recorded in the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub since: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            since: Utc::now(),
            command: std::env::args().next(),
        }
    }
}

/// Exclusive lock on the state documents, released on drop.
pub struct StoreLockGuard {
    _file: File,
    lock_path: PathBuf,
    holder_path: Option<PathBuf>,
}

impl StoreLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl std::fmt::Debug for StoreLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLockGuard").field("lock_path", &self.lock_path).finish()
    }
}

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        if let Some(path) = self.holder_path.take() {
            if let Err(e) = fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Could not remove lock holder file");
            }
        }
        debug!(lock = %self.lock_path.display(), "Store lock released");
    }
}

/// `state.json` -> `state.json.lock`, `state` -> `state.lock`.
pub fn lock_path_for(doc_path: &Path) -> PathBuf {
    let mut name = doc_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    doc_path.with_file_name(name)
}

fn holder_path_for(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".json");
    lock_path.with_file_name(name)
}

/// Holder recorded for the lock guarding `doc_path`, if any.
pub fn current_holder(doc_path: &Path) -> Option<LockHolder> {
    let raw = fs::read(holder_path_for(&lock_path_for(doc_path))).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn lock_error(lock_path: &Path) -> impl FnOnce(io::Error) -> BurninError + '_ {
    move |source| BurninError::Lock {
        path: lock_path.to_path_buf(),
        source,
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File> {
    if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(lock_error(lock_path))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(lock_error(lock_path))
}

fn record_holder(lock_path: &Path) -> Option<PathBuf> {
    let path = holder_path_for(lock_path);
    let written = serde_json::to_vec_pretty(&LockHolder::current())
        .map_err(io::Error::from)
        .and_then(|bytes| fs::write(&path, bytes));
    match written {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not record lock holder");
            None
        }
    }
}

fn guard(file: File, lock_path: PathBuf) -> StoreLockGuard {
    let holder_path = record_holder(&lock_path);
    StoreLockGuard {
        _file: file,
        lock_path,
        holder_path,
    }
}

/// Take the lock or fail with `Locked` if another process has it.
pub fn try_lock_exclusive(doc_path: &Path) -> Result<StoreLockGuard> {
    let lock_path = lock_path_for(doc_path);
    let file = open_lock_file(&lock_path)?;

    // Fully qualified: newer std has an inherent File::try_lock_exclusive.
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(guard(file, lock_path)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            let holder = current_holder(doc_path);
            debug!(lock = %lock_path.display(), holder = ?holder, "Store is busy");
            Err(BurninError::Locked(doc_path.to_path_buf()))
        }
        Err(source) => Err(BurninError::Lock {
            path: lock_path,
            source,
        }),
    }
}

/// Take the lock, waiting for the current holder if there is one.
pub fn lock_exclusive(doc_path: &Path) -> Result<StoreLockGuard> {
    match try_lock_exclusive(doc_path) {
        Err(BurninError::Locked(_)) => {}
        other => return other,
    }

    let lock_path = lock_path_for(doc_path);
    match current_holder(doc_path) {
        Some(holder) => info!(pid = holder.pid, since = %holder.since, "Waiting for store lock"),
        None => info!(lock = %lock_path.display(), "Waiting for store lock"),
    }
    let file = open_lock_file(&lock_path)?;
    FileExt::lock_exclusive(&file).map_err(lock_error(&lock_path))?;
    Ok(guard(file, lock_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_sits_next_to_document() {
        assert_eq!(
            lock_path_for(Path::new("/data/state.json")),
            PathBuf::from("/data/state.json.lock")
        );
        assert_eq!(lock_path_for(Path::new("state")), PathBuf::from("state.lock"));
        assert_eq!(
            holder_path_for(Path::new("/data/state.json.lock")),
            PathBuf::from("/data/state.json.lock.json")
        );
    }

    #[test]
    fn second_locker_is_refused_until_release() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("state.json");

        let first = try_lock_exclusive(&doc).unwrap();
        assert!(first.lock_path().exists());
        assert!(matches!(try_lock_exclusive(&doc), Err(BurninError::Locked(_))));
        drop(first);

        let _again = lock_exclusive(&doc).unwrap();
    }

    #[test]
    fn holder_recorded_while_locked() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("nested").join("state.json");

        let guard = lock_exclusive(&doc).unwrap();
        let holder = current_holder(&doc).unwrap();
        assert_eq!(holder.pid, std::process::id());

        drop(guard);
        assert!(current_holder(&doc).is_none());
    }
}
