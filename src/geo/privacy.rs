// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Privacy-zone filtering of stored polylines.
//!
//! Strips any point that falls inside a configured privacy disk, and any
//! point near the original track's first/last point (so a stored trace
//! never reveals where a run started or ended).

use crate::config::PrivacyConfig;
use crate::error::Result;
use crate::geo::{codec, haversine_m};

/// Filter an encoded polyline through the configured privacy zones.
///
/// Returns `None` when fewer than two points survive; a one-point polyline
/// is useless to the front-end and would violate the decode invariant.
pub fn filter_polyline(encoded: &str, privacy: &PrivacyConfig) -> Result<Option<String>> {
    if !privacy.is_active() {
        return Ok(Some(encoded.to_string()));
    }

    let points = codec::decode(encoded)?;
    let kept = filter_points(&points, privacy);

    if kept.len() < 2 {
        return Ok(None);
    }
    Ok(Some(codec::encode(&kept)?))
}

/// Filter a raw (lat, lon) series, keeping points outside every zone.
pub fn filter_points(points: &[(f64, f64)], privacy: &PrivacyConfig) -> Vec<(f64, f64)> {
    let endpoints: Vec<(f64, f64)> = match (points.first(), points.last()) {
        (Some(&first), Some(&last)) if privacy.start_end_radius_m > 0.0 => vec![first, last],
        _ => Vec::new(),
    };

    points
        .iter()
        .copied()
        .filter(|&p| {
            let in_zone = privacy
                .centers
                .iter()
                .any(|&c| haversine_m(p, c) <= privacy.radius_m);
            let near_endpoint = endpoints
                .iter()
                .any(|&e| haversine_m(p, e) <= privacy.start_end_radius_m);
            !in_zone && !near_endpoint
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_point_track() -> Vec<(f64, f64)> {
        vec![
            (39.9042, 116.4074),
            (39.9050, 116.4090),
            (39.9060, 116.4110),
        ]
    }

    #[test]
    fn test_no_config_passes_through() {
        let privacy = PrivacyConfig::default();
        let encoded = codec::encode(&three_point_track()).unwrap();
        let out = filter_polyline(&encoded, &privacy).unwrap();
        assert_eq!(out, Some(encoded));
    }

    #[test]
    fn test_zone_strips_points_inside_radius() {
        let points = three_point_track();
        let privacy = PrivacyConfig {
            centers: vec![points[0]],
            radius_m: 100.0,
            start_end_radius_m: 0.0,
        };
        let kept = filter_points(&points, &privacy);
        // First point is the center itself; the others are >100 m away
        assert!(!kept.contains(&points[0]));
        for p in &kept {
            assert!(haversine_m(*p, points[0]) > 100.0);
        }
    }

    #[test]
    fn test_start_end_radius_strips_endpoints() {
        let points = three_point_track();
        let privacy = PrivacyConfig {
            centers: Vec::new(),
            radius_m: 0.0,
            start_end_radius_m: 50.0,
        };
        let kept = filter_points(&points, &privacy);
        assert!(!kept.contains(&points[0]));
        assert!(!kept.contains(&points[2]));
    }

    #[test]
    fn test_fewer_than_two_survivors_yields_none() {
        // Center on the first point plus a 50 m endpoint radius leaves at
        // most the middle point; the result must be None.
        let points = three_point_track();
        let privacy = PrivacyConfig {
            centers: vec![points[0]],
            radius_m: 100.0,
            start_end_radius_m: 50.0,
        };
        let encoded = codec::encode(&points).unwrap();
        let out = filter_polyline(&encoded, &privacy).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_no_survivor_within_zone_after_filter() {
        // Property P5 on a denser synthetic track.
        let points: Vec<(f64, f64)> = (0..50)
            .map(|i| (39.9000 + i as f64 * 0.0005, 116.4000 + i as f64 * 0.0005))
            .collect();
        let privacy = PrivacyConfig {
            centers: vec![points[25]],
            radius_m: 150.0,
            start_end_radius_m: 100.0,
        };
        let kept = filter_points(&points, &privacy);
        for p in &kept {
            assert!(haversine_m(*p, points[25]) > 150.0);
            assert!(haversine_m(*p, points[0]) > 100.0);
            assert!(haversine_m(*p, points[49]) > 100.0);
        }
    }
}
