// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google polyline codec (precision 5) over (lat, lon) pairs.
//!
//! Thin wrappers around the `polyline` crate so the rest of the code never
//! has to remember that `geo` coordinates are (x, y) = (lon, lat).

use geo::LineString;

use crate::error::{AppError, Result};

/// Encoding precision used throughout (factor 1e5, the Strava convention).
pub const PRECISION: u32 = 5;

/// Encode a sequence of (lat, lon) pairs.
pub fn encode(points: &[(f64, f64)]) -> Result<String> {
    let line = LineString::from(
        points
            .iter()
            .map(|&(lat, lon)| (lon, lat))
            .collect::<Vec<_>>(),
    );
    polyline::encode_coordinates(line, PRECISION)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Polyline encode failed: {}", e)))
}

/// Decode an encoded polyline into (lat, lon) pairs.
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>> {
    let line = polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Polyline decode failed: {}", e)))?;
    Ok(line.0.into_iter().map(|c| (c.y, c.x)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_lossless_to_five_decimals() {
        let points = vec![
            (39.9042, 116.4074),
            (39.9050, 116.4090),
            (-33.86785, 151.20732),
            (0.0, 0.0),
        ];
        let encoded = encode(&points).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.len(), points.len());
        for (orig, got) in points.iter().zip(decoded.iter()) {
            assert!((orig.0 - got.0).abs() < 1e-5, "{:?} vs {:?}", orig, got);
            assert!((orig.1 - got.1).abs() < 1e-5, "{:?} vs {:?}", orig, got);
        }
    }

    #[test]
    fn test_decode_google_reference_polyline() {
        // The worked example from Google's polyline algorithm docs.
        let decoded = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(
            decoded,
            vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)]
        );
    }
}
