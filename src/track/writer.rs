// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPX 1.1 writing, used to turn provider JSON snapshots into files the
//! Strava upload endpoint accepts.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use geo::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::{AppError, Result};
use crate::models::TrackPoint;

/// Write a point series as a single-track GPX 1.1 file.
pub fn write_gpx(path: &Path, name: &str, sport: &str, points: &[TrackPoint]) -> Result<()> {
    if points.len() < 2 {
        return Err(AppError::parse(path, "refusing to write a track with fewer than 2 points"));
    }

    let mut segment = TrackSegment::new();
    for p in points {
        let mut wp = Waypoint::new(Point::new(p.lon, p.lat));
        wp.elevation = p.elevation_m;
        if let Some(t) = p.time {
            if let Ok(odt) = time::OffsetDateTime::from_unix_timestamp(t.timestamp()) {
                wp.time = Some(odt.into());
            }
        }
        segment.points.push(wp);
    }

    let track = Track {
        name: Some(name.to_string()),
        type_: Some(sport.to_string()),
        segments: vec![segment],
        ..Default::default()
    };

    let gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("runsync".to_string()),
        tracks: vec![track],
        ..Default::default()
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", path.display(), e)))?;
    gpx::write(&gpx, BufWriter::new(file))
        .map_err(|e| AppError::Storage(format!("Failed to write GPX: {}", e)))?;
    Ok(())
}
