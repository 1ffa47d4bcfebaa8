// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Format-agnostic track parsing.
//!
//! Each per-format reader extracts a [`RawTrack`] (points plus whatever
//! summary fields the format carries); [`summarize`] then applies the
//! canonical normalization contract: run id from the first timestamp,
//! moving-time gap heuristic, haversine distance fallback, indoor
//! detection, polyline down-sampling, elevation smoothing.

pub mod fit;
pub mod gpx;
pub mod kml;
pub mod tcx;
pub mod writer;

use std::path::Path;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geo::{codec, haversine_m};
use crate::models::{Activity, ActivityType, TrackPoint};
use crate::time_utils;

/// Gaps longer than this are treated as pauses and excluded from moving time.
const PAUSE_THRESHOLD_SECS: i64 = 10;
/// Minimum horizontal displacement for a gap to count as movement.
const MOVING_DISPLACEMENT_M: f64 = 0.3;
/// A track whose points all fit in this radius is an indoor recording.
const INDOOR_RADIUS_M: f64 = 20.0;

/// Supported track file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Tcx,
    Fit,
    Kml,
}

impl TrackFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::Tcx => "tcx",
            Self::Fit => "fit",
            Self::Kml => "kml",
        }
    }
}

/// What a per-format reader extracts from a file, before normalization.
#[derive(Debug, Default)]
pub struct RawTrack {
    pub points: Vec<TrackPoint>,
    /// Format-specific sport hint (TCX `Sport` attribute, FIT `sport` field)
    pub sport: Option<String>,
    /// Explicit total distance from the format's summary section
    pub total_distance_m: Option<f64>,
    /// Explicit moving time from the format's summary section
    pub total_moving_seconds: Option<i64>,
    /// Track or activity name, when present
    pub name: Option<String>,
}

/// A normalized activity together with its decoded point series.
#[derive(Debug)]
pub struct ParsedTrack {
    pub activity: Activity,
    pub points: Vec<TrackPoint>,
}

/// Parse a track file of the given format into a canonical activity.
///
/// KML files carry no timestamps, so they cannot be normalized standalone;
/// the road-trip adapter supplies the missing metadata and goes through
/// [`kml::read_linestring`] directly.
pub fn parse_track(path: &Path, format: TrackFormat, config: &Config) -> Result<ParsedTrack> {
    let raw = match format {
        TrackFormat::Gpx => gpx::read_track(path)?,
        TrackFormat::Tcx => tcx::read_track(path)?,
        TrackFormat::Fit => fit::read_track(path)?,
        TrackFormat::Kml => {
            return Err(AppError::parse(
                path,
                "KML traces carry no timestamps; use the road-trip adapter",
            ))
        }
    };
    summarize(raw, path, format.extension(), config)
}

/// Apply the canonical normalization contract to a raw track.
pub fn summarize(
    raw: RawTrack,
    path: &Path,
    source: &str,
    config: &Config,
) -> Result<ParsedTrack> {
    if raw.points.len() < 2 {
        return Err(AppError::parse(
            path,
            format!("track has {} point(s), need at least 2", raw.points.len()),
        ));
    }

    let timed: Vec<&TrackPoint> = raw.points.iter().filter(|p| p.time.is_some()).collect();
    let (start_utc, end_utc) = match (timed.first(), timed.last()) {
        (Some(first), Some(last)) if timed.len() >= 2 => {
            (first.time.unwrap_or_default(), last.time.unwrap_or_default())
        }
        _ => return Err(AppError::parse(path, "track has no usable timestamps")),
    };
    if end_utc < start_utc {
        return Err(AppError::parse(path, "track timestamps run backwards"));
    }
    let elapsed_seconds = (end_utc - start_utc).num_seconds();

    // An explicit total (multi-lap TCX, FIT timer time) can exceed the
    // trackpoint span when the recording has dropouts; moving time never
    // exceeds elapsed time.
    let moving_seconds = raw
        .total_moving_seconds
        .unwrap_or_else(|| moving_time(&raw.points))
        .min(elapsed_seconds);

    let indoor = is_indoor(&raw.points);

    let length_m = if indoor {
        raw.total_distance_m.unwrap_or(0.0)
    } else {
        raw.total_distance_m
            .unwrap_or_else(|| track_length(&raw.points))
    };

    let (start_latlng, summary_polyline) = if indoor {
        (None, None)
    } else {
        let latlngs: Vec<(f64, f64)> = raw.points.iter().map(TrackPoint::latlng).collect();
        let sampled = downsample(&latlngs, config.max_polyline_points);
        (Some(latlngs[0]), Some(codec::encode(&sampled)?))
    };

    let activity_type = match raw.sport.as_deref() {
        Some(sport) => ActivityType::from_provider(sport).ok_or_else(|| {
            AppError::parse(path, format!("unknown activity type {:?}", sport))
        })?,
        None => ActivityType::Run,
    };

    let offset = time_utils::local_offset(start_utc, start_latlng, &config.default_timezone);
    let start_time_local = time_utils::format_local(start_utc.with_timezone(&offset));
    let end_time_local = time_utils::format_local(end_utc.with_timezone(&offset));

    let activity = Activity {
        run_id: time_utils::epoch_ms(start_utc),
        name: raw
            .name
            .unwrap_or_else(|| Activity::default_name(activity_type, source)),
        activity_type,
        subtype: raw.sport,
        start_time_utc: start_utc,
        start_time_local,
        end_time_local,
        length_m,
        moving_seconds,
        elapsed_seconds,
        average_speed_mps: Activity::compute_average_speed(length_m, moving_seconds),
        elevation_gain_m: elevation_gain(&raw.points),
        average_heartrate_bpm: mean_heart_rate(&raw.points),
        start_latlng,
        summary_polyline,
        location_country: None,
        source: source.to_string(),
    };

    Ok(ParsedTrack {
        activity,
        points: raw.points,
    })
}

/// Moving time heuristic: sum gaps that show real displacement and are not
/// pauses.
fn moving_time(points: &[TrackPoint]) -> i64 {
    points
        .windows(2)
        .filter_map(|w| {
            let (a, b) = (&w[0], &w[1]);
            let (ta, tb) = (a.time?, b.time?);
            let gap = (tb - ta).num_seconds();
            if gap <= 0 || gap > PAUSE_THRESHOLD_SECS {
                return None;
            }
            if haversine_m(a.latlng(), b.latlng()) > MOVING_DISPLACEMENT_M {
                Some(gap)
            } else {
                None
            }
        })
        .sum()
}

/// Sum of haversine distances between successive points.
fn track_length(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_m(w[0].latlng(), w[1].latlng()))
        .sum()
}

/// All points within a 20 m radius of the first one: treadmill/indoor.
fn is_indoor(points: &[TrackPoint]) -> bool {
    let first = match points.first() {
        Some(p) => p.latlng(),
        None => return false,
    };
    points
        .iter()
        .all(|p| haversine_m(first, p.latlng()) <= INDOOR_RADIUS_M)
}

/// Keep every K-th point so at most `max` survive; the final kept slot is
/// swapped for the last point so the trace still ends where the activity
/// ended.
pub fn downsample(points: &[(f64, f64)], max: usize) -> Vec<(f64, f64)> {
    if points.len() <= max {
        return points.to_vec();
    }
    let k = points.len().div_ceil(max);
    let mut sampled: Vec<(f64, f64)> = points.iter().copied().step_by(k).collect();
    if sampled.last() != points.last() {
        if let (Some(slot), Some(&last)) = (sampled.last_mut(), points.last()) {
            *slot = last;
        }
    }
    sampled
}

/// Arithmetic mean of the non-null heart-rate samples.
fn mean_heart_rate(points: &[TrackPoint]) -> Option<f64> {
    let samples: Vec<f64> = points.iter().filter_map(|p| p.heart_rate).collect();
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Positive elevation differences after a 3-sample moving average.
fn elevation_gain(points: &[TrackPoint]) -> Option<f64> {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation_m).collect();
    if elevations.len() < 2 {
        return None;
    }

    let smoothed: Vec<f64> = (0..elevations.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(elevations.len() - 1);
            let window = &elevations[lo..=hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect();

    let gain: f64 = smoothed
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .sum();
    Some(gain)
}
