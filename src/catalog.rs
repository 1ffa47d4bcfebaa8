// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON catalog projection for the static front-end.
//!
//! The catalog is a flat JSON array of every stored activity, oldest
//! first, regenerated from the store after each successful sync. The write
//! is atomic (tmp + rename) so a reader never sees a half-written file.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::Activity;
use crate::time_utils;

/// One catalog entry, shaped for the front-end rather than the store.
/// Optional fields serialize as explicit nulls so every entry carries the
/// same keys.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub run_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: &'static str,
    pub subtype: Option<String>,
    pub start_date: String,
    pub start_date_local: String,
    pub end_date_local: String,
    pub distance: f64,
    pub moving_time: i64,
    pub elapsed_time: i64,
    pub average_speed: f64,
    pub average_heartrate: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub summary_polyline: Option<String>,
    pub location_country: Option<String>,
    pub source: String,
}

impl From<&Activity> for CatalogEntry {
    fn from(a: &Activity) -> Self {
        Self {
            run_id: a.run_id,
            name: a.name.clone(),
            activity_type: a.activity_type.as_str(),
            subtype: a.subtype.clone(),
            start_date: time_utils::format_utc_rfc3339(a.start_time_utc),
            start_date_local: a.start_time_local.clone(),
            end_date_local: a.end_time_local.clone(),
            distance: a.length_m,
            moving_time: a.moving_seconds,
            elapsed_time: a.elapsed_seconds,
            average_speed: a.average_speed_mps,
            average_heartrate: a.average_heartrate_bpm,
            elevation_gain: a.elevation_gain_m,
            summary_polyline: a.summary_polyline.clone(),
            location_country: a.location_country.clone(),
            source: a.source.clone(),
        }
    }
}

/// Regenerate the catalog file from the store.
pub fn project(store: &Store, path: &Path) -> Result<()> {
    let activities = store.list_all()?;
    let entries: Vec<CatalogEntry> = activities.iter().map(CatalogEntry::from).collect();

    let json = serde_json::to_string_pretty(&entries)
        .map_err(|e| AppError::Storage(format!("Failed to serialize catalog: {}", e)))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::Storage(format!("Failed to rename {}: {}", tmp.display(), e)))?;

    tracing::info!(path = %path.display(), count = entries.len(), "Catalog projected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use chrono::{TimeZone, Utc};

    fn sample(run_id: i64) -> Activity {
        Activity {
            run_id,
            name: "Morning Run".to_string(),
            activity_type: ActivityType::Run,
            subtype: Some("running".to_string()),
            start_time_utc: Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap(),
            start_time_local: "2023-05-01 16:00:00".to_string(),
            end_time_local: "2023-05-01 16:30:00".to_string(),
            length_m: 5000.0,
            moving_seconds: 1500,
            elapsed_seconds: 1800,
            average_speed_mps: 3.33,
            elevation_gain_m: None,
            average_heartrate_bpm: Some(150.0),
            start_latlng: Some((39.9042, 116.4074)),
            summary_polyline: None,
            location_country: None,
            source: "gpx".to_string(),
        }
    }

    #[test]
    fn test_project_writes_sorted_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activities.json");

        let store = Store::open_in_memory().unwrap();
        let mut later = sample(2);
        later.start_time_utc = Utc.with_ymd_and_hms(2023, 5, 2, 8, 0, 0).unwrap();
        store.upsert(&later).unwrap();
        store.upsert(&sample(1)).unwrap();

        project(&store, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        // Oldest first
        assert_eq!(entries[0]["run_id"], 1);
        assert_eq!(entries[0]["type"], "Run");
        assert_eq!(entries[0]["start_date"], "2023-05-01T08:00:00Z");
        assert_eq!(entries[0]["distance"], 5000.0);
        // Null optionals stay present so the key set is stable
        assert!(entries[0]["elevation_gain"].is_null());
        assert!(entries[0]["location_country"].is_null());
        assert!(entries[0]["summary_polyline"].is_null());
        assert_eq!(entries[0]["average_heartrate"], 150.0);
    }

    #[test]
    fn test_project_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activities.json");
        let store = Store::open_in_memory().unwrap();
        project(&store, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
