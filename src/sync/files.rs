// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local-folder adapter for GPX/TCX/FIT files.
//!
//! Walks a directory tree, skips files already recorded in the synced-file
//! log (by path + mtime signature), and ingests the rest. A file that fails
//! to parse is logged, recorded as processed, and skipped; one bad export
//! must not wedge the whole folder.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::db::sync_log::file_signature;
use crate::error::Result;
use crate::sync::Adapter;
use crate::track::{self, TrackFormat};
use crate::AppContext;

/// Adapter ingesting one track format from a local directory.
pub struct FileAdapter {
    dir: PathBuf,
    format: TrackFormat,
}

impl FileAdapter {
    pub fn new(dir: impl Into<PathBuf>, format: TrackFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// Enumerate candidate files, sorted so ingestion order is stable.
    fn candidates(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let wanted = self.format.extension();
                match path.extension().and_then(|e| e.to_str()) {
                    Some(ext) => {
                        ext.eq_ignore_ascii_case(wanted)
                            // Compressed FIT exports keep the inner extension
                            || (self.format == TrackFormat::Fit
                                && ext.eq_ignore_ascii_case("gz")
                                && path
                                    .file_stem()
                                    .and_then(|s| PathBuf::from(s).extension().map(|e| e.to_ascii_lowercase()))
                                    .is_some_and(|e| e == "fit"))
                    }
                    None => false,
                }
            })
            .collect();
        files.sort();
        files
    }
}

#[async_trait]
impl Adapter for FileAdapter {
    fn source(&self) -> &'static str {
        self.format.extension()
    }

    async fn sync(&mut self, ctx: &mut AppContext, _since: Option<DateTime<Utc>>) -> Result<usize> {
        if !self.dir.is_dir() {
            tracing::warn!(dir = %self.dir.display(), "Track directory does not exist");
            return Ok(0);
        }

        let mut stored = 0usize;
        for path in self.candidates() {
            let signature = file_signature(&path)?;
            if ctx.sync_log.contains(&signature) {
                continue;
            }

            match track::parse_track(&path, self.format, &ctx.config) {
                Ok(parsed) => {
                    if ctx.finish_activity(parsed.activity)? {
                        stored += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Skipping unparseable file");
                }
            }
            // Recorded either way: a file that failed once will fail again
            // until it is modified, which changes its signature.
            ctx.sync_log.insert(signature);
        }
        Ok(stored)
    }
}
