// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TCX (Training Center XML) reading via a streaming quick-xml scan.
//!
//! TCX carries explicit per-lap totals (`TotalTimeSeconds`,
//! `DistanceMeters`), which take precedence over the computed fallbacks in
//! the summarize step.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::models::TrackPoint;
use crate::track::RawTrack;

#[derive(Default)]
struct PendingPoint {
    lat: Option<f64>,
    lon: Option<f64>,
    elevation_m: Option<f64>,
    time: Option<DateTime<Utc>>,
    heart_rate: Option<f64>,
}

/// Read a TCX file into a raw track.
pub fn read_track(path: &Path) -> Result<RawTrack> {
    let file = File::open(path)
        .map_err(|e| AppError::parse(path, format!("cannot open: {}", e)))?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut raw = RawTrack::default();
    let mut lap_seconds = 0.0f64;
    let mut lap_distance = 0.0f64;
    let mut saw_lap_totals = false;

    let mut in_trackpoint = false;
    let mut in_hr = false;
    let mut pending = PendingPoint::default();
    // Name of the element whose text we are about to read
    let mut current: Vec<u8> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_vec();
                match local.as_slice() {
                    b"Activity" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"Sport" {
                                if let Ok(v) = attr.unescape_value() {
                                    raw.sport = Some(v.into_owned());
                                }
                            }
                        }
                    }
                    b"Trackpoint" => {
                        in_trackpoint = true;
                        pending = PendingPoint::default();
                    }
                    b"HeartRateBpm" => in_hr = true,
                    _ => {}
                }
                current = local;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::parse(path, e.to_string()))?;
                let text = text.trim();
                match current.as_slice() {
                    b"Time" if in_trackpoint => {
                        pending.time = DateTime::parse_from_rfc3339(text)
                            .ok()
                            .map(|d| d.with_timezone(&Utc));
                    }
                    b"LatitudeDegrees" if in_trackpoint => pending.lat = text.parse().ok(),
                    b"LongitudeDegrees" if in_trackpoint => pending.lon = text.parse().ok(),
                    b"AltitudeMeters" if in_trackpoint => pending.elevation_m = text.parse().ok(),
                    b"Value" if in_trackpoint && in_hr => {
                        pending.heart_rate = text.parse().ok();
                    }
                    b"TotalTimeSeconds" if !in_trackpoint => {
                        if let Ok(v) = text.parse::<f64>() {
                            lap_seconds += v;
                            saw_lap_totals = true;
                        }
                    }
                    b"DistanceMeters" if !in_trackpoint => {
                        if let Ok(v) = text.parse::<f64>() {
                            lap_distance += v;
                            saw_lap_totals = true;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                match local_name(e.name().as_ref()) {
                    b"Trackpoint" => {
                        in_trackpoint = false;
                        if let (Some(lat), Some(lon)) = (pending.lat, pending.lon) {
                            raw.points.push(TrackPoint {
                                lat,
                                lon,
                                elevation_m: pending.elevation_m,
                                time: pending.time,
                                heart_rate: pending.heart_rate,
                            });
                        }
                    }
                    b"HeartRateBpm" => in_hr = false,
                    _ => {}
                }
                current.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::parse(path, e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if saw_lap_totals {
        if lap_seconds > 0.0 {
            raw.total_moving_seconds = Some(lap_seconds.round() as i64);
        }
        if lap_distance > 0.0 {
            raw.total_distance_m = Some(lap_distance);
        }
    }

    Ok(raw)
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Running">
      <Id>2023-05-01T08:00:00Z</Id>
      <Lap StartTime="2023-05-01T08:00:00Z">
        <TotalTimeSeconds>110.0</TotalTimeSeconds>
        <DistanceMeters>360.0</DistanceMeters>
        <Track>
          <Trackpoint>
            <Time>2023-05-01T08:00:00Z</Time>
            <Position>
              <LatitudeDegrees>39.9042</LatitudeDegrees>
              <LongitudeDegrees>116.4074</LongitudeDegrees>
            </Position>
            <AltitudeMeters>44.0</AltitudeMeters>
            <HeartRateBpm><Value>141</Value></HeartRateBpm>
            <DistanceMeters>0.0</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2023-05-01T08:01:00Z</Time>
            <Position>
              <LatitudeDegrees>39.9050</LatitudeDegrees>
              <LongitudeDegrees>116.4090</LongitudeDegrees>
            </Position>
            <AltitudeMeters>45.0</AltitudeMeters>
            <HeartRateBpm><Value>149</Value></HeartRateBpm>
            <DistanceMeters>170.0</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2023-05-01T08:02:00Z</Time>
            <Position>
              <LatitudeDegrees>39.9060</LatitudeDegrees>
              <LongitudeDegrees>116.4110</LongitudeDegrees>
            </Position>
            <AltitudeMeters>46.0</AltitudeMeters>
            <HeartRateBpm><Value>155</Value></HeartRateBpm>
            <DistanceMeters>360.0</DistanceMeters>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    fn write_sample() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.tcx");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_points_with_heart_rate() {
        let (_dir, path) = write_sample();
        let raw = read_track(&path).unwrap();

        assert_eq!(raw.points.len(), 3);
        assert_eq!(raw.points[0].heart_rate, Some(141.0));
        assert_eq!(raw.points[2].elevation_m, Some(46.0));
        assert!(raw.points[0].time.is_some());
    }

    #[test]
    fn test_sport_attribute_and_lap_totals() {
        let (_dir, path) = write_sample();
        let raw = read_track(&path).unwrap();

        assert_eq!(raw.sport.as_deref(), Some("Running"));
        assert_eq!(raw.total_moving_seconds, Some(110));
        assert_eq!(raw.total_distance_m, Some(360.0));
    }

    #[test]
    fn test_trackpoint_distance_not_counted_as_lap_total() {
        // Per-point DistanceMeters are cumulative odometer readings and
        // must not be summed into the lap total.
        let (_dir, path) = write_sample();
        let raw = read_track(&path).unwrap();
        assert_eq!(raw.total_distance_m, Some(360.0));
    }

    #[test]
    fn test_empty_file_yields_no_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tcx");
        std::fs::write(&path, "<TrainingCenterDatabase/>").unwrap();
        let raw = read_track(&path).unwrap();
        assert!(raw.points.is_empty());
    }
}
