// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPX 1.1 reading.
//!
//! Structure comes from the `gpx` crate; heart rate lives in a Garmin
//! TrackPointExtension the crate does not expose, so a second lightweight
//! scan pulls `<gpxtpx:hr>` values aligned by trackpoint order.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::models::TrackPoint;
use crate::track::RawTrack;

/// Read a GPX file into a raw track.
pub fn read_track(path: &Path) -> Result<RawTrack> {
    let file = File::open(path)
        .map_err(|e| AppError::parse(path, format!("cannot open: {}", e)))?;
    let gpx: ::gpx::Gpx = ::gpx::read(BufReader::new(file))
        .map_err(|e| AppError::parse(path, e.to_string()))?;

    let heart_rates = read_heart_rates(path).unwrap_or_default();

    let mut raw = RawTrack::default();
    let mut index = 0usize;

    for track in &gpx.tracks {
        if raw.name.is_none() {
            raw.name = track.name.clone();
        }
        if raw.sport.is_none() {
            raw.sport = track.type_.clone();
        }
        for segment in &track.segments {
            for waypoint in &segment.points {
                let point = waypoint.point();
                raw.points.push(TrackPoint {
                    lat: point.y(),
                    lon: point.x(),
                    elevation_m: waypoint.elevation,
                    time: waypoint.time.and_then(to_chrono),
                    heart_rate: heart_rates.get(index).copied().flatten(),
                });
                index += 1;
            }
        }
    }

    Ok(raw)
}

fn to_chrono(t: ::gpx::Time) -> Option<DateTime<Utc>> {
    let odt: time::OffsetDateTime = t.into();
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

/// Scan for `<gpxtpx:hr>` values, one slot per `<trkpt>` in document order.
fn read_heart_rates(path: &Path) -> Result<Vec<Option<f64>>> {
    let file = File::open(path)
        .map_err(|e| AppError::parse(path, format!("cannot open: {}", e)))?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut heart_rates: Vec<Option<f64>> = Vec::new();
    let mut in_trkpt = false;
    let mut in_hr = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if name == b"trkpt" {
                    in_trkpt = true;
                    heart_rates.push(None);
                } else if in_trkpt && name == b"hr" {
                    in_hr = true;
                }
            }
            Ok(Event::Text(t)) if in_hr => {
                if let (Some(slot), Ok(text)) = (heart_rates.last_mut(), t.unescape()) {
                    *slot = text.trim().parse().ok();
                }
            }
            Ok(Event::End(e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if name == b"trkpt" {
                    in_trkpt = false;
                } else if name == b"hr" {
                    in_hr = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::parse(path, e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(heart_rates)
}

/// Strip the namespace prefix from a qualified name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
