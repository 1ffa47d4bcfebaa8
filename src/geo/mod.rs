// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geodesic helpers: polyline codec, privacy filtering, datum shifting.

pub mod codec;
pub mod gcj02;
pub mod privacy;

use geo::{Distance, Haversine, Point};

/// Haversine distance in meters between two (lat, lon) pairs.
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    // geo points are (x, y) = (lon, lat)
    Haversine.distance(Point::new(a.1, a.0), Point::new(b.1, b.0))
}
