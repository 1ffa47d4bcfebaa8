// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite activity store.
//!
//! A single `activities` table keyed by `run_id`. Migrations are
//! forward-only and additive: new columns are detected via
//! `pragma_table_info` and added with ALTER, so databases written by older
//! versions keep working.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType};
use crate::time_utils::format_utc_rfc3339;

/// Filter for [`Store::list`]. Every field is optional; unset fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_distance_m: Option<f64>,
}

/// SQLite-backed activity store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| AppError::Storage(format!("Failed to open {}: {}", path.as_ref().display(), e)))?;

        // WAL keeps the journal from appearing/disappearing on every write
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self { conn };
        store.init_tables()?;
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open in-memory store: {}", e)))?;
        let store = Self { conn };
        store.init_tables()?;
        store.migrate()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                run_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                subtype TEXT,
                start_date TEXT NOT NULL,
                start_date_local TEXT NOT NULL,
                end_date_local TEXT NOT NULL,
                distance REAL NOT NULL,
                moving_time INTEGER NOT NULL,
                elapsed_time INTEGER NOT NULL,
                average_speed REAL NOT NULL,
                average_heartrate REAL,
                start_latitude REAL,
                start_longitude REAL,
                summary_polyline TEXT,
                location_country TEXT,
                source TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_source ON activities(source);
            CREATE INDEX IF NOT EXISTS idx_activities_start_date ON activities(start_date);
            "#,
        )?;
        Ok(())
    }

    /// Forward-only additive migrations.
    fn migrate(&self) -> Result<()> {
        if !self.has_column("elevation_gain")? {
            tracing::info!("Migrating store: adding elevation_gain column");
            self.conn
                .execute("ALTER TABLE activities ADD COLUMN elevation_gain REAL", [])?;
        }
        Ok(())
    }

    fn has_column(&self, name: &str) -> Result<bool> {
        let present: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('activities') WHERE name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(present)
    }

    /// Insert or replace an activity keyed by `run_id`. Idempotent.
    pub fn upsert(&self, activity: &Activity) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO activities (
                run_id, name, type, subtype,
                start_date, start_date_local, end_date_local,
                distance, moving_time, elapsed_time, average_speed,
                average_heartrate, elevation_gain,
                start_latitude, start_longitude,
                summary_polyline, location_country, source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                activity.run_id,
                activity.name,
                activity.activity_type.as_str(),
                activity.subtype,
                format_utc_rfc3339(activity.start_time_utc),
                activity.start_time_local,
                activity.end_time_local,
                activity.length_m,
                activity.moving_seconds,
                activity.elapsed_seconds,
                activity.average_speed_mps,
                activity.average_heartrate_bpm,
                activity.elevation_gain_m,
                activity.start_latlng.map(|p| p.0),
                activity.start_latlng.map(|p| p.1),
                activity.summary_polyline,
                activity.location_country,
                activity.source,
            ],
        )?;
        Ok(())
    }

    /// List activities matching a filter, oldest first.
    pub fn list(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let mut sql = String::from(
            "SELECT run_id, name, type, subtype, start_date, start_date_local, \
             end_date_local, distance, moving_time, elapsed_time, average_speed, \
             average_heartrate, elevation_gain, start_latitude, start_longitude, \
             summary_polyline, location_country, source FROM activities",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(t) = filter.activity_type {
            clauses.push("type = ?");
            args.push(t.as_str().to_string());
        }
        if let Some(from) = filter.from {
            clauses.push("start_date >= ?");
            args.push(format_utc_rfc3339(from));
        }
        if let Some(to) = filter.to {
            clauses.push("start_date <= ?");
            args.push(format_utc_rfc3339(to));
        }
        if let Some(min) = filter.min_distance_m {
            clauses.push("distance >= ?");
            args.push(min.to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY start_date ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_activity)?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?);
        }
        Ok(activities)
    }

    /// All activities, oldest first (the catalog projection input).
    pub fn list_all(&self) -> Result<Vec<Activity>> {
        self.list(&ActivityFilter::default())
    }

    /// Latest `start_time_utc` seen from a given adapter. Backs the
    /// per-adapter sync cursor.
    pub fn max_start_time(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        let max: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(start_date) FROM activities WHERE source = ?",
                params![source],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        match max {
            Some(s) => {
                let parsed = DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| AppError::Storage(format!("Bad start_date in store: {}", e)))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    /// Total number of stored activities.
    pub fn count(&self) -> Result<i64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let type_str: String = row.get(2)?;
    let start_date: String = row.get(4)?;
    let lat: Option<f64> = row.get(13)?;
    let lon: Option<f64> = row.get(14)?;

    Ok(Activity {
        run_id: row.get(0)?,
        name: row.get(1)?,
        activity_type: ActivityType::from_str_exact(&type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown activity type {:?}", type_str).into(),
            )
        })?,
        subtype: row.get(3)?,
        start_time_utc: DateTime::parse_from_rfc3339(&start_date)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc),
        start_time_local: row.get(5)?,
        end_time_local: row.get(6)?,
        length_m: row.get(7)?,
        moving_seconds: row.get(8)?,
        elapsed_seconds: row.get(9)?,
        average_speed_mps: row.get(10)?,
        average_heartrate_bpm: row.get(11)?,
        elevation_gain_m: row.get(12)?,
        start_latlng: match (lat, lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        },
        summary_polyline: row.get(15)?,
        location_country: row.get(16)?,
        source: row.get(17)?,
    })
}
