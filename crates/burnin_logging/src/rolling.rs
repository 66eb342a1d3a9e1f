//! Size-capped log file with numbered backups.
//!
//! `<name>.log` receives writes; once a write would push it past the cap it
//! becomes `<name>.log.1`, older backups shift up by one and anything past
//! the retention count is deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// How much log history to keep on disk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Retention {
    /// Live file plus backups
    pub files: usize,
    pub bytes_per_file: u64,
}

pub(crate) struct RotatingLog {
    dir: PathBuf,
    stem: String,
    retention: Retention,
    file: File,
    written: u64,
}

impl RotatingLog {
    pub(crate) fn open(dir: &Path, stem: &str, retention: Retention) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let live = dir.join(format!("{stem}.log"));
        let file = append_to(&live)?;
        let written = file.metadata()?.len();
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
            retention: Retention {
                files: retention.files.max(1),
                ..retention
            },
            file,
            written,
        };
        if log.written > log.retention.bytes_per_file {
            log.roll()?;
        }
        Ok(log)
    }

    fn live_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, n))
    }

    /// Shift backups up by one and start an empty live file.
    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let keep = self.retention.files - 1;
        if keep > 0 {
            remove_if_present(&self.backup_path(keep))?;
            for n in (1..keep).rev() {
                rename_if_present(&self.backup_path(n), &self.backup_path(n + 1))?;
            }
            rename_if_present(&self.live_path(), &self.backup_path(1))?;
        } else {
            remove_if_present(&self.live_path())?;
        }
        self.file = append_to(&self.live_path())?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.retention.bytes_per_file {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn rename_if_present(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// `MakeWriter` handle shared by every event; each write takes the lock.
#[derive(Clone)]
pub(crate) struct SharedLog(Arc<Mutex<RotatingLog>>);

impl SharedLog {
    pub(crate) fn new(log: RotatingLog) -> Self {
        Self(Arc::new(Mutex::new(log)))
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, RotatingLog>> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file mutex poisoned"))
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLog {
    type Writer = SharedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small(files: usize) -> Retention {
        Retention {
            files,
            bytes_per_file: 16,
        }
    }

    #[test]
    fn rolls_into_numbered_backups() {
        let temp = TempDir::new().unwrap();
        let mut log = RotatingLog::open(temp.path(), "scan", small(3)).unwrap();

        log.write_all(b"0123456789").unwrap();
        log.write_all(b"0123456789").unwrap();
        log.flush().unwrap();

        assert!(temp.path().join("scan.log").exists());
        assert!(temp.path().join("scan.log.1").exists());
        assert!(!temp.path().join("scan.log.2").exists());
    }

    #[test]
    fn drops_backups_past_retention() {
        let temp = TempDir::new().unwrap();
        let mut log = RotatingLog::open(temp.path(), "scan", small(2)).unwrap();
        for _ in 0..5 {
            log.write_all(b"0123456789ab").unwrap();
        }
        log.flush().unwrap();

        assert!(temp.path().join("scan.log.1").exists());
        assert!(!temp.path().join("scan.log.2").exists());
        assert_eq!(fs::read(temp.path().join("scan.log")).unwrap(), b"0123456789ab");
    }

    #[test]
    fn oversized_existing_file_is_rolled_on_open() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("scan.log"), vec![b'x'; 64]).unwrap();

        let log = RotatingLog::open(temp.path(), "scan", small(3)).unwrap();
        assert_eq!(log.written, 0);
        assert!(temp.path().join("scan.log.1").exists());
    }
}
