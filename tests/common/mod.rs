// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::path::Path;

use runsync::config::{Config, PrivacyConfig};
use runsync::services::rate_limit::RateLimiter;
use runsync::AppContext;

/// Config rooted in a temp directory.
#[allow(dead_code)]
pub fn test_config(dir: &Path) -> Config {
    Config {
        db_path: dir.join("activities.db"),
        catalog_path: dir.join("activities.json"),
        sync_log_path: dir.join("synced_files.json"),
        data_dir: dir.to_path_buf(),
        default_timezone: chrono_tz::UTC,
        per_page: 200,
        max_polyline_points: 400,
        privacy: PrivacyConfig::default(),
    }
}

/// Fully file-backed context rooted in a temp directory.
#[allow(dead_code)]
pub fn test_context(dir: &Path) -> AppContext {
    AppContext::open(test_config(dir), RateLimiter::unlimited())
        .expect("Failed to open test context")
}

/// The three-point Beijing run used across the integration tests.
#[allow(dead_code)]
pub const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>Morning Run</name><type>running</type><trkseg>
    <trkpt lat="39.9042" lon="116.4074"><ele>50.0</ele><time>2023-05-01T08:00:00Z</time></trkpt>
    <trkpt lat="39.9050" lon="116.4090"><ele>52.0</ele><time>2023-05-01T08:01:00Z</time></trkpt>
    <trkpt lat="39.9060" lon="116.4110"><ele>51.0</ele><time>2023-05-01T08:02:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;
