// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! runsync: personal fitness-activity aggregator.
//!
//! Pulls workouts from provider APIs and local track files, normalizes
//! them into one canonical record, persists them in a local SQLite store,
//! and projects a JSON catalog for a static front-end.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod models;
pub mod services;
pub mod sync;
pub mod time_utils;
pub mod track;

use chrono::{DateTime, Utc};

use config::Config;
use db::{Store, SyncedFileLog};
use error::Result;
use models::Activity;
use services::rate_limit::RateLimiter;

/// Application context threaded through every adapter.
///
/// Holds the pieces that would otherwise be global state: the store
/// handle, the synced-file log, the rate limiter, and user config. One
/// context per run; all store writes go through it.
pub struct AppContext {
    pub config: Config,
    pub store: Store,
    pub sync_log: SyncedFileLog,
    pub limiter: RateLimiter,
    /// Ingest only activities of canonical type Run.
    pub only_run: bool,
    /// Ignore the sync cursor and re-ingest everything.
    pub refresh_all: bool,
}

impl AppContext {
    /// Open the store and sync log under the configured data directory.
    pub fn open(config: Config, limiter: RateLimiter) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            error::AppError::Storage(format!(
                "Failed to create {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;
        let store = Store::open(&config.db_path)?;
        let sync_log = SyncedFileLog::load(&config.sync_log_path)?;
        Ok(Self {
            config,
            store,
            sync_log,
            limiter,
            only_run: false,
            refresh_all: false,
        })
    }

    /// In-memory context for testing.
    pub fn open_in_memory(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            store: Store::open_in_memory()?,
            sync_log: SyncedFileLog::default(),
            limiter: RateLimiter::unlimited(),
            only_run: false,
            refresh_all: false,
        })
    }

    /// Resolve the sync cursor for an adapter: the latest start time
    /// already stored from that source, or `None` under `--all`.
    pub fn cursor(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        if self.refresh_all {
            return Ok(None);
        }
        self.store.max_start_time(source)
    }

    /// Final normalization step shared by every adapter: privacy-filter
    /// the polyline, then upsert. Returns whether the activity was kept
    /// (an `--only-run` mismatch is skipped here as a backstop).
    pub fn finish_activity(&mut self, mut activity: Activity) -> Result<bool> {
        if self.only_run && activity.activity_type != models::ActivityType::Run {
            tracing::debug!(run_id = activity.run_id, "Skipping non-run activity");
            return Ok(false);
        }

        if let Some(encoded) = activity.summary_polyline.take() {
            activity.summary_polyline =
                geo::privacy::filter_polyline(&encoded, &self.config.privacy)?;
        }

        self.store.upsert(&activity)?;
        tracing::debug!(
            run_id = activity.run_id,
            source = %activity.source,
            "Stored activity"
        );
        Ok(true)
    }
}
