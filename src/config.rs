// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Credentials arrive on the command line; everything else (paths, privacy
//! zones, default timezone) comes from the environment so the same binary
//! can be pointed at different data directories.

use std::env;
use std::path::PathBuf;

use crate::geo::codec;

/// Privacy-zone settings controlling which polyline points are stripped
/// before storage.
#[derive(Debug, Clone, Default)]
pub struct PrivacyConfig {
    /// Center points of privacy zones, decoded from `IGNORE_POLYLINE`.
    pub centers: Vec<(f64, f64)>,
    /// Radius in meters around each center (`IGNORE_RANGE`).
    pub radius_m: f64,
    /// Radius in meters around each track's first/last point
    /// (`IGNORE_START_END_RANGE`).
    pub start_end_radius_m: f64,
}

impl PrivacyConfig {
    /// Whether any filtering is configured at all.
    pub fn is_active(&self) -> bool {
        (!self.centers.is_empty() && self.radius_m > 0.0) || self.start_end_radius_m > 0.0
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all persisted state.
    pub data_dir: PathBuf,
    /// SQLite database file holding the `activities` table.
    pub db_path: PathBuf,
    /// JSON catalog file consumed by the static front-end.
    pub catalog_path: PathBuf,
    /// JSON sync log of already-processed file identifiers.
    pub sync_log_path: PathBuf,
    /// Fallback timezone when an activity has no coordinates.
    pub default_timezone: chrono_tz::Tz,
    /// Strava page size for activity listing.
    pub per_page: u32,
    /// Maximum number of points kept in a stored summary polyline.
    pub max_polyline_points: usize,
    /// Privacy-zone filtering settings.
    pub privacy: PrivacyConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let data_dir = PathBuf::from(
            env::var("RUNSYNC_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );

        let default_timezone = match env::var("RUNSYNC_TIMEZONE") {
            Ok(name) => name
                .parse::<chrono_tz::Tz>()
                .map_err(|_| ConfigError::Invalid("RUNSYNC_TIMEZONE"))?,
            Err(_) => chrono_tz::UTC,
        };

        let privacy = PrivacyConfig {
            centers: match env::var("IGNORE_POLYLINE") {
                Ok(encoded) if !encoded.is_empty() => codec::decode(&encoded)
                    .map_err(|_| ConfigError::Invalid("IGNORE_POLYLINE"))?,
                _ => Vec::new(),
            },
            radius_m: parse_meters("IGNORE_RANGE")?,
            start_end_radius_m: parse_meters("IGNORE_START_END_RANGE")?,
        };

        Ok(Self {
            db_path: data_dir.join("activities.db"),
            catalog_path: data_dir.join("activities.json"),
            sync_log_path: data_dir.join("synced_files.json"),
            data_dir,
            default_timezone,
            per_page: env::var("RUNSYNC_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            max_polyline_points: env::var("RUNSYNC_MAX_POLYLINE_POINTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(400),
            privacy,
        })
    }

    /// Per-adapter folder for downloaded track files.
    pub fn download_dir(&self, source: &str) -> PathBuf {
        self.data_dir.join(source)
    }
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            db_path: data_dir.join("activities.db"),
            catalog_path: data_dir.join("activities.json"),
            sync_log_path: data_dir.join("synced_files.json"),
            data_dir,
            default_timezone: chrono_tz::UTC,
            per_page: 200,
            max_polyline_points: 400,
            privacy: PrivacyConfig::default(),
        }
    }
}

/// Parse an optional meters value from the environment.
fn parse_meters(var: &'static str) -> Result<f64, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => v.trim().parse().map_err(|_| ConfigError::Invalid(var)),
        _ => Ok(0.0),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_inactive_by_default() {
        let privacy = PrivacyConfig::default();
        assert!(!privacy.is_active());
    }

    #[test]
    fn test_privacy_active_with_start_end_radius() {
        let privacy = PrivacyConfig {
            centers: Vec::new(),
            radius_m: 0.0,
            start_end_radius_m: 50.0,
        };
        assert!(privacy.is_active());
    }

    #[test]
    fn test_download_dir_per_source() {
        let config = Config::default();
        assert_eq!(config.download_dir("garmin"), PathBuf::from("data/garmin"));
    }
}
