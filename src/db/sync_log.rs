// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synced-file log: the set of file identifiers already ingested.
//!
//! Complements the per-adapter sync cursor for sources with no reliable
//! ordering (local folders, per-file downloads). Identifiers are opaque
//! strings: `path|mtime` signatures for local files, provider ids or URLs
//! for downloads. The set only ever grows.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// JSON-persisted monotonic set of processed file identifiers.
#[derive(Debug, Default)]
pub struct SyncedFileLog {
    path: PathBuf,
    entries: BTreeSet<String>,
    dirty: bool,
}

impl SyncedFileLog {
    /// Load the log from disk, starting empty when the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| AppError::Storage(format!("Corrupt sync log {}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read sync log {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// Whether an identifier has already been processed.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Record an identifier as processed.
    pub fn insert(&mut self, id: impl Into<String>) {
        if self.entries.insert(id.into()) {
            self.dirty = true;
        }
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the log atomically (tmp + rename). No-op when unchanged.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| AppError::Storage(format!("Failed to serialize sync log: {}", e)))?;
        fs::write(&tmp, json)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AppError::Storage(format!("Failed to rename {}: {}", tmp.display(), e)))?;
        self.dirty = false;
        Ok(())
    }
}

/// Build the signature for a local file: path plus mtime, so an edited file
/// is picked up again.
pub fn file_signature(path: &Path) -> Result<String> {
    let meta = fs::metadata(path)
        .map_err(|e| AppError::Storage(format!("Failed to stat {}: {}", path.display(), e)))?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(format!("{}|{}", path.display(), mtime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = SyncedFileLog::load(dir.path().join("synced.json")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synced.json");

        let mut log = SyncedFileLog::load(&path).unwrap();
        log.insert("a.gpx|100");
        log.insert("b.gpx|200");
        log.save().unwrap();

        let reloaded = SyncedFileLog::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("a.gpx|100"));
        assert!(!reloaded.contains("c.gpx|300"));
    }

    #[test]
    fn test_save_without_changes_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synced.json");
        let mut log = SyncedFileLog::load(&path).unwrap();
        log.save().unwrap();
        // Nothing was inserted, so no file should exist
        assert!(!path.exists());
    }

    #[test]
    fn test_file_signature_changes_with_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run.gpx");
        fs::write(&file, "x").unwrap();
        let sig = file_signature(&file).unwrap();
        assert!(sig.starts_with(file.display().to_string().as_str()));
        assert!(sig.contains('|'));
    }
}
