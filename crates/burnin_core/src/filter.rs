//! File filtering rules, compiled once from configuration.
//!
//! A file is accepted iff its extension is allowed (or no allow-list is
//! configured), its name matches none of the exclude globs, and its size is at
//! least the configured minimum. Only the name and size already obtained from
//! directory enumeration are consulted.

use crate::config::FileFilteringConfig;
use crate::error::{BurninError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;

/// Compiled filtering predicate. Stateless after construction.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include_extensions: HashSet<String>,
    exclude: GlobSet,
    exclude_count: usize,
    min_size: u64,
}

/// Lowercase an extension and give it a leading dot.
pub fn normalize_extension(raw: &str) -> String {
    let ext = raw.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

impl FileFilter {
    pub fn compile(config: &FileFilteringConfig) -> Result<Self> {
        let include_extensions = config
            .include_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = GlobBuilder::new(pattern.trim())
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    BurninError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
                })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| BurninError::Config(format!("Invalid exclude patterns: {}", e)))?;

        Ok(Self {
            include_extensions,
            exclude,
            exclude_count: config.exclude_patterns.len(),
            min_size: config.min_file_size_bytes,
        })
    }

    /// Accept everything.
    pub fn allow_all() -> Self {
        Self {
            include_extensions: HashSet::new(),
            exclude: GlobSet::empty(),
            exclude_count: 0,
            min_size: 0,
        }
    }

    pub fn accepts(&self, file_name: &str, size: u64) -> bool {
        if !self.include_extensions.is_empty() {
            let ext = Path::new(file_name)
                .extension()
                .map(|e| normalize_extension(&e.to_string_lossy()))
                .unwrap_or_default();
            if !self.include_extensions.contains(&ext) {
                return false;
            }
        }

        if self.exclude_count > 0 && self.exclude.is_match(file_name) {
            return false;
        }

        size >= self.min_size
    }

    /// One-line summary for the startup log.
    pub fn describe(&self) -> String {
        format!(
            "{} extensions, {} exclude patterns, min size: {}B",
            self.include_extensions.len(),
            self.exclude_count,
            self.min_size
        )
    }
}
