// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and timezone resolution.

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, TimeZone, Utc};

use crate::geo::gcj02;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a local wall-clock time the way the catalog stores it.
pub fn format_local(date: DateTime<FixedOffset>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Epoch milliseconds for a UTC timestamp (used as file-sourced run ids).
pub fn epoch_ms(date: DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

/// Resolve the UTC offset for an activity.
///
/// When the track has a start position the offset is derived from it:
/// points inside the China bounding box are pinned to UTC+8 (the whole
/// country uses one zone), everything else gets the nautical estimate of
/// one hour per 15 degrees of longitude. Tracks without coordinates fall
/// back to the configured default timezone, evaluated at the activity's
/// start instant so DST is honored.
pub fn local_offset(
    at: DateTime<Utc>,
    start: Option<(f64, f64)>,
    default_tz: &chrono_tz::Tz,
) -> FixedOffset {
    match start {
        Some((lat, lon)) => {
            if gcj02::in_china(lat, lon) {
                FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
            } else {
                let hours = (lon / 15.0).round() as i32;
                FixedOffset::east_opt(hours.clamp(-12, 14) * 3600)
                    .unwrap_or_else(|| Utc.fix())
            }
        }
        None => default_tz.offset_from_utc_datetime(&at.naive_utc()).fix(),
    }
}
