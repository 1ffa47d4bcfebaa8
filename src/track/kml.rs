// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! KML 2.2 LineString reading.
//!
//! KML road-trip traces carry coordinates only, no timestamps, so this
//! module just extracts the point sequence; the road-trip adapter supplies
//! the temporal metadata.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};

/// Read all LineString coordinates from a KML file as (lat, lon) pairs.
///
/// KML writes coordinate tuples as `lon,lat[,ele]` separated by
/// whitespace; note the reversed order relative to everything else.
pub fn read_linestring(path: &Path) -> Result<Vec<(f64, f64)>> {
    let file = File::open(path)
        .map_err(|e| AppError::parse(path, format!("cannot open: {}", e)))?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut points = Vec::new();
    let mut in_linestring = false;
    let mut in_coordinates = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"LineString" => in_linestring = true,
                b"coordinates" if in_linestring => in_coordinates = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_coordinates => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::parse(path, e.to_string()))?;
                for tuple in text.split_whitespace() {
                    let mut parts = tuple.split(',');
                    let lon: Option<f64> = parts.next().and_then(|v| v.parse().ok());
                    let lat: Option<f64> = parts.next().and_then(|v| v.parse().ok());
                    if let (Some(lon), Some(lat)) = (lon, lat) {
                        points.push((lat, lon));
                    }
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"LineString" => in_linestring = false,
                b"coordinates" => in_coordinates = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::parse(path, e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if points.is_empty() {
        return Err(AppError::parse(path, "no LineString coordinates found"));
    }
    if points.len() < 2 {
        return Err(AppError::parse(path, "LineString needs at least 2 coordinates"));
    }
    Ok(points)
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
