//! Bulk timestamp collection for one device inbox.
//!
//! One directory enumeration per inbox; the size and modification time come
//! from the enumeration entry itself. The result is sorted ascending by
//! modification time so the cutoff counter can bisect it.

use crate::filter::FileFilter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// One accepted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: DateTime<Utc>,
    pub name: String,
}

/// What happened when the inbox was enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Ok,
    Missing,
    Unreadable,
}

/// Sorted stamps for one inbox. Missing or unreadable inboxes yield an empty
/// listing; the scan carries on with zero files for that device.
#[derive(Debug, Clone)]
pub struct InboxListing {
    pub stamps: Vec<FileStamp>,
    pub status: InboxStatus,
    /// Entries that vanished or could not be read mid-enumeration
    pub skipped: usize,
}

impl InboxListing {
    fn empty(status: InboxStatus) -> Self {
        Self {
            stamps: Vec::new(),
            status,
            skipped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Enumerate `inbox` once and return accepted files sorted by mtime.
pub fn collect_timestamps(inbox: &Path, filter: &FileFilter) -> InboxListing {
    if !inbox.is_dir() {
        if inbox.exists() {
            warn!(path = %inbox.display(), "Inbox is not a directory");
            return InboxListing::empty(InboxStatus::Unreadable);
        }
        warn!(path = %inbox.display(), "Inbox does not exist");
        return InboxListing::empty(InboxStatus::Missing);
    }

    let started = Instant::now();
    let mut stamps = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(inbox)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.path().map(|p| p == inbox).unwrap_or(true) {
                    error!(path = %inbox.display(), error = %e, "Cannot enumerate inbox");
                    return InboxListing::empty(InboxStatus::Unreadable);
                }
                warn!(error = %e, "Could not access inbox entry");
                skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Could not access file");
                skipped += 1;
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        if !filter.accepts(&name, metadata.len()) {
            continue;
        }

        match metadata.modified() {
            Ok(modified) => stamps.push(FileStamp {
                modified: DateTime::<Utc>::from(modified),
                name,
            }),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "No modification time");
                skipped += 1;
            }
        }
    }

    stamps.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

    let elapsed = started.elapsed();
    debug!(
        path = %inbox.display(),
        files = stamps.len(),
        skipped,
        elapsed_ms = elapsed.as_millis() as u64,
        "Collected file timestamps"
    );

    InboxListing {
        stamps,
        status: InboxStatus::Ok,
        skipped,
    }
}
