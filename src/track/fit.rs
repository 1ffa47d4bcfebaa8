// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT reading via `fitparser`.
//!
//! Record messages carry the point series (positions in semicircles);
//! the session message carries the sport and explicit totals. Gzipped
//! files (`.fit.gz`, the Strava bulk-export form) are handled
//! transparently.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};
use flate2::read::GzDecoder;

use crate::error::{AppError, Result};
use crate::models::TrackPoint;
use crate::track::RawTrack;

/// Semicircles to degrees: 180 / 2^31.
const SEMICIRCLE_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Read a FIT (or gzipped FIT) file into a raw track.
pub fn read_track(path: &Path) -> Result<RawTrack> {
    let bytes = read_bytes(path)?;
    let records =
        fitparser::from_bytes(&bytes).map_err(|e| AppError::parse(path, e.to_string()))?;

    let mut raw = RawTrack::default();
    for record in &records {
        match record.kind() {
            MesgNum::Record => {
                if let Some(point) = extract_point(record) {
                    raw.points.push(point);
                }
            }
            MesgNum::Session => extract_session(record, &mut raw),
            _ => {}
        }
    }
    Ok(raw)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut file =
        File::open(path).map_err(|e| AppError::parse(path, format!("cannot open: {}", e)))?;
    let gzipped = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".gz"));

    let mut bytes = Vec::new();
    if gzipped {
        GzDecoder::new(file)
            .read_to_end(&mut bytes)
            .map_err(|e| AppError::parse(path, format!("gzip: {}", e)))?;
    } else {
        file.read_to_end(&mut bytes)
            .map_err(|e| AppError::parse(path, e.to_string()))?;
    }
    Ok(bytes)
}

fn extract_point(record: &FitDataRecord) -> Option<TrackPoint> {
    let mut lat = None;
    let mut lon = None;
    let mut elevation_m = None;
    let mut time = None;
    let mut heart_rate = None;

    for field in record.fields() {
        match field.name() {
            "position_lat" => lat = numeric(field.value()).map(|v| v * SEMICIRCLE_DEGREES),
            "position_long" => lon = numeric(field.value()).map(|v| v * SEMICIRCLE_DEGREES),
            // enhanced_altitude supersedes altitude when both are present
            "enhanced_altitude" => elevation_m = numeric(field.value()),
            "altitude" => {
                if elevation_m.is_none() {
                    elevation_m = numeric(field.value());
                }
            }
            "heart_rate" => heart_rate = numeric(field.value()),
            "timestamp" => {
                if let Value::Timestamp(t) = field.value() {
                    time = Some(t.with_timezone(&Utc));
                }
            }
            _ => {}
        }
    }

    Some(TrackPoint {
        lat: lat?,
        lon: lon?,
        elevation_m,
        time,
        heart_rate,
    })
}

fn extract_session(record: &FitDataRecord, raw: &mut RawTrack) {
    for field in record.fields() {
        match field.name() {
            "sport" => {
                if let Value::String(s) = field.value() {
                    raw.sport = Some(s.clone());
                }
            }
            "total_distance" => raw.total_distance_m = numeric(field.value()),
            "total_timer_time" => {
                raw.total_moving_seconds = numeric(field.value()).map(|v| v.round() as i64);
            }
            _ => {}
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::SInt8(v) => Some(f64::from(*v)),
        Value::UInt8(v) => Some(f64::from(*v)),
        Value::SInt16(v) => Some(f64::from(*v)),
        Value::UInt16(v) => Some(f64::from(*v)),
        Value::SInt32(v) => Some(f64::from(*v)),
        Value::UInt32(v) => Some(f64::from(*v)),
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicircle_conversion() {
        // Quarter of the signed 32-bit range is 45 degrees
        let quarter = 536_870_912.0;
        assert!((quarter * SEMICIRCLE_DEGREES - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_covers_integer_widths() {
        assert_eq!(numeric(&Value::UInt8(150)), Some(150.0));
        assert_eq!(numeric(&Value::SInt32(-5)), Some(-5.0));
        assert_eq!(numeric(&Value::String("x".into())), None);
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fit");
        std::fs::write(&path, b"definitely not a fit file").unwrap();
        assert!(matches!(
            read_track(&path).unwrap_err(),
            AppError::Parse { .. }
        ));
    }
}
