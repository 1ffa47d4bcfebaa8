// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical activity record and activity-type mapping.
//!
//! Every adapter, whatever its provider speaks, produces this one record.
//! The provider's original type string is preserved in `subtype`; `type`
//! is always a member of the canonical enumeration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical activity categories used internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    Run,
    TrailRun,
    Ride,
    VirtualRide,
    IndoorRide,
    Hike,
    Swim,
    Rowing,
    RoadTrip,
    Flight,
    Kayaking,
    Snowboard,
    Ski,
}

/// Static table mapping provider-specific type strings to canonical types.
///
/// Walking is deliberately mapped to `Hike`: the canonical set has no Walk
/// member and the two are indistinguishable in most provider data.
const TYPE_TABLE: &[(&str, ActivityType)] = &[
    ("Run", ActivityType::Run),
    ("run", ActivityType::Run),
    ("running", ActivityType::Run),
    ("RUNNING", ActivityType::Run),
    ("TrailRun", ActivityType::TrailRun),
    ("Trail Run", ActivityType::TrailRun),
    ("trail_running", ActivityType::TrailRun),
    ("Ride", ActivityType::Ride),
    ("Biking", ActivityType::Ride),
    ("cycling", ActivityType::Ride),
    ("CYCLING", ActivityType::Ride),
    ("VirtualRide", ActivityType::VirtualRide),
    ("IndoorRide", ActivityType::IndoorRide),
    ("indoor_cycling", ActivityType::IndoorRide),
    ("Hike", ActivityType::Hike),
    ("hiking", ActivityType::Hike),
    ("Walk", ActivityType::Hike),
    ("Walking", ActivityType::Hike),
    ("walking", ActivityType::Hike),
    ("Swim", ActivityType::Swim),
    ("swimming", ActivityType::Swim),
    ("lap_swimming", ActivityType::Swim),
    ("Rowing", ActivityType::Rowing),
    ("rowing", ActivityType::Rowing),
    ("RoadTrip", ActivityType::RoadTrip),
    ("Flight", ActivityType::Flight),
    ("flying", ActivityType::Flight),
    ("Kayaking", ActivityType::Kayaking),
    ("kayaking", ActivityType::Kayaking),
    ("Snowboard", ActivityType::Snowboard),
    ("snowboarding", ActivityType::Snowboard),
    ("Ski", ActivityType::Ski),
    ("AlpineSki", ActivityType::Ski),
    ("NordicSki", ActivityType::Ski),
    ("resort_skiing_snowboarding", ActivityType::Ski),
];

impl ActivityType {
    /// Map a provider-specific type string to a canonical type.
    ///
    /// Returns `None` for unknown strings; the caller logs and skips the
    /// activity rather than storing an out-of-enumeration value.
    pub fn from_provider(s: &str) -> Option<Self> {
        TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, t)| *t)
    }

    /// Catalog string for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "Run",
            Self::TrailRun => "Trail Run",
            Self::Ride => "Ride",
            Self::VirtualRide => "VirtualRide",
            Self::IndoorRide => "Indoor Ride",
            Self::Hike => "Hike",
            Self::Swim => "Swim",
            Self::Rowing => "Rowing",
            Self::RoadTrip => "RoadTrip",
            Self::Flight => "Flight",
            Self::Kayaking => "Kayaking",
            Self::Snowboard => "Snowboard",
            Self::Ski => "Ski",
        }
    }

    /// Parse the catalog string form back (used when reading the store).
    pub fn from_str_exact(s: &str) -> Option<Self> {
        match s {
            "Run" => Some(Self::Run),
            "Trail Run" => Some(Self::TrailRun),
            "Ride" => Some(Self::Ride),
            "VirtualRide" => Some(Self::VirtualRide),
            "Indoor Ride" => Some(Self::IndoorRide),
            "Hike" => Some(Self::Hike),
            "Swim" => Some(Self::Swim),
            "Rowing" => Some(Self::Rowing),
            "RoadTrip" => Some(Self::RoadTrip),
            "Flight" => Some(Self::Flight),
            "Kayaking" => Some(Self::Kayaking),
            "Snowboard" => Some(Self::Snowboard),
            "Ski" => Some(Self::Ski),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Provider activity id, or start-time epoch milliseconds for
    /// file-sourced records. Unique across the store.
    pub run_id: i64,
    /// Activity name/title
    pub name: String,
    /// Canonical activity type
    pub activity_type: ActivityType,
    /// Provider-specific original type string
    pub subtype: Option<String>,
    /// Start time in UTC
    pub start_time_utc: DateTime<Utc>,
    /// Start wall-clock time at the activity's location
    pub start_time_local: String,
    /// End wall-clock time at the activity's location
    pub end_time_local: String,
    /// Distance in meters
    pub length_m: f64,
    /// Moving time in seconds
    pub moving_seconds: i64,
    /// Elapsed time in seconds
    pub elapsed_seconds: i64,
    /// Average moving speed in m/s
    pub average_speed_mps: f64,
    /// Total positive elevation gain in meters
    pub elevation_gain_m: Option<f64>,
    /// Mean heart rate in bpm
    pub average_heartrate_bpm: Option<f64>,
    /// Start position (lat, lon), WGS-84
    pub start_latlng: Option<(f64, f64)>,
    /// Encoded summary polyline, WGS-84
    pub summary_polyline: Option<String>,
    /// Country name, when the provider reports one
    pub location_country: Option<String>,
    /// Originating adapter identifier
    pub source: String,
}

impl Activity {
    /// Average speed per the canonical contract: zero when there is no
    /// moving time.
    pub fn compute_average_speed(length_m: f64, moving_seconds: i64) -> f64 {
        if moving_seconds > 0 {
            length_m / moving_seconds as f64
        } else {
            0.0
        }
    }

    /// Synthesized default name for records the provider left unnamed.
    pub fn default_name(activity_type: ActivityType, source: &str) -> String {
        format!("{} from {}", activity_type, source)
    }
}

/// One raw sample of a decoded track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub heart_rate: Option<f64>,
}

impl TrackPoint {
    pub fn latlng(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_provider_strings_map() {
        assert_eq!(ActivityType::from_provider("running"), Some(ActivityType::Run));
        assert_eq!(ActivityType::from_provider("Ride"), Some(ActivityType::Ride));
        assert_eq!(
            ActivityType::from_provider("AlpineSki"),
            Some(ActivityType::Ski)
        );
    }

    #[test]
    fn test_walk_maps_to_hike() {
        assert_eq!(ActivityType::from_provider("Walk"), Some(ActivityType::Hike));
        assert_eq!(
            ActivityType::from_provider("walking"),
            Some(ActivityType::Hike)
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert_eq!(ActivityType::from_provider("Yoga"), None);
        assert_eq!(ActivityType::from_provider(""), None);
    }

    #[test]
    fn test_catalog_string_round_trip() {
        for (_, t) in super::TYPE_TABLE {
            assert_eq!(ActivityType::from_str_exact(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn test_average_speed_zero_without_moving_time() {
        assert_eq!(Activity::compute_average_speed(1000.0, 0), 0.0);
        assert_eq!(Activity::compute_average_speed(1000.0, 500), 2.0);
    }

    #[test]
    fn test_default_name() {
        assert_eq!(
            Activity::default_name(ActivityType::Run, "gpx"),
            "Run from gpx"
        );
    }
}
