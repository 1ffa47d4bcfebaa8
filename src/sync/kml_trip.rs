// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Road-trip adapter: a KML route plus human-entered metadata.
//!
//! KML routes carry geometry but no timestamps, so the normal track
//! pipeline cannot date them. The trip dates, driving hours per day, and
//! total distance come from the command line; the route supplies the
//! polyline and start position.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::sync_log::file_signature;
use crate::error::{AppError, Result};
use crate::geo::{codec, gcj02};
use crate::models::{Activity, ActivityType};
use crate::sync::Adapter;
use crate::time_utils;
use crate::track::{self, kml};
use crate::AppContext;

/// One road trip: route file plus the metadata KML cannot express.
pub struct RoadTripAdapter {
    pub kml_path: PathBuf,
    pub name: String,
    /// First day of the trip.
    pub start_date: NaiveDate,
    /// Last day of the trip, inclusive.
    pub end_date: NaiveDate,
    /// Hours actually on the road each day.
    pub hours_per_day: i64,
    pub distance_km: f64,
    /// Route coordinates are GCJ-02 (exported from a Chinese map app).
    pub is_gcj02: bool,
}

impl RoadTripAdapter {
    fn build_activity(&self, ctx: &AppContext) -> Result<Activity> {
        if self.end_date < self.start_date {
            return Err(AppError::parse(&self.kml_path, "trip ends before it starts"));
        }
        if !(1..=24).contains(&self.hours_per_day) {
            return Err(AppError::parse(
                &self.kml_path,
                "hours per day must be between 1 and 24",
            ));
        }
        if self.distance_km <= 0.0 {
            return Err(AppError::parse(&self.kml_path, "trip distance must be positive"));
        }

        let mut route = kml::read_linestring(&self.kml_path)?;
        if self.is_gcj02 {
            route = gcj02::shift_series_to_wgs84(&route);
        }
        let start_latlng = route[0];

        let sampled = track::downsample(&route, ctx.config.max_polyline_points);
        let summary_polyline = codec::encode(&sampled)?;

        let days = (self.end_date - self.start_date).num_days() + 1;
        let moving_seconds = days * self.hours_per_day * 3600;
        let elapsed_seconds = days * 86_400;

        let start_naive = self
            .start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::parse(&self.kml_path, "invalid trip start date"))?;
        let offset = time_utils::local_offset(
            DateTime::from_naive_utc_and_offset(start_naive, Utc),
            Some(start_latlng),
            &ctx.config.default_timezone,
        );
        let start_utc: DateTime<Utc> = match start_naive.and_local_timezone(offset).single() {
            Some(t) => t.with_timezone(&Utc),
            None => DateTime::from_naive_utc_and_offset(start_naive, Utc),
        };

        let start_local = start_utc.with_timezone(&offset);
        let end_local = start_local + chrono::Duration::seconds(elapsed_seconds);

        let length_m = self.distance_km * 1000.0;
        Ok(Activity {
            run_id: time_utils::epoch_ms(start_utc),
            name: self.name.clone(),
            activity_type: ActivityType::RoadTrip,
            subtype: None,
            start_time_utc: start_utc,
            start_time_local: time_utils::format_local(start_local),
            end_time_local: time_utils::format_local(end_local),
            length_m,
            moving_seconds,
            elapsed_seconds,
            average_speed_mps: Activity::compute_average_speed(length_m, moving_seconds),
            elevation_gain_m: None,
            average_heartrate_bpm: None,
            start_latlng: Some(start_latlng),
            summary_polyline: Some(summary_polyline),
            location_country: None,
            source: "kml".to_string(),
        })
    }
}

#[async_trait]
impl Adapter for RoadTripAdapter {
    fn source(&self) -> &'static str {
        "kml"
    }

    async fn sync(&mut self, ctx: &mut AppContext, _since: Option<DateTime<Utc>>) -> Result<usize> {
        let signature = file_signature(&self.kml_path)?;
        if ctx.sync_log.contains(&signature) {
            tracing::info!(file = %self.kml_path.display(), "Trip already ingested");
            return Ok(0);
        }

        let activity = self.build_activity(ctx)?;
        let stored = ctx.finish_activity(activity)?;
        ctx.sync_log.insert(signature);
        Ok(stored as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const SAMPLE_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document><Placemark><LineString><coordinates>
    116.4074,39.9042,50 117.2,39.1,40 118.8,32.06,30
  </coordinates></LineString></Placemark></Document>
</kml>"#;

    fn trip(dir: &std::path::Path) -> RoadTripAdapter {
        let path = dir.join("trip.kml");
        std::fs::write(&path, SAMPLE_KML).unwrap();
        RoadTripAdapter {
            kml_path: path,
            name: "Beijing to Nanjing".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 5, 12).unwrap(),
            hours_per_day: 6,
            distance_km: 4000.0,
            is_gcj02: false,
        }
    }

    #[tokio::test]
    async fn test_twelve_day_trip_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let mut adapter = trip(dir.path());

        assert_eq!(adapter.sync(&mut ctx, None).await.unwrap(), 1);

        let activities = ctx.store.list_all().unwrap();
        let a = &activities[0];
        assert_eq!(a.activity_type, ActivityType::RoadTrip);
        assert_eq!(a.length_m, 4_000_000.0);
        // 12 days at 6 hours on the road each
        assert_eq!(a.moving_seconds, 259_200);
        assert_eq!(a.elapsed_seconds, 12 * 86_400);
        assert!((a.average_speed_mps - 15.43).abs() < 0.01);
        assert_eq!(a.start_latlng, Some((39.9042, 116.4074)));
        assert_eq!(a.start_time_local, "2023-05-01 00:00:00");
        assert!(a.summary_polyline.is_some());
        assert_eq!(a.source, "kml");
    }

    #[tokio::test]
    async fn test_second_ingest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let mut adapter = trip(dir.path());
        assert_eq!(adapter.sync(&mut ctx, None).await.unwrap(), 1);
        assert_eq!(adapter.sync(&mut ctx, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gcj02_route_is_shifted() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let mut adapter = trip(dir.path());
        adapter.is_gcj02 = true;
        adapter.sync(&mut ctx, None).await.unwrap();

        let a = &ctx.store.list_all().unwrap()[0];
        let (lat, lon) = a.start_latlng.unwrap();
        // Shifted away from the raw GCJ-02 coordinates, but only slightly
        assert_ne!((lat, lon), (39.9042, 116.4074));
        assert!((lat - 39.9042).abs() < 0.01);
        assert!((lon - 116.4074).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_single_point_route_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let mut adapter = trip(dir.path());
        std::fs::write(
            &adapter.kml_path,
            r#"<kml><Document><Placemark><LineString><coordinates>
                 116.4074,39.9042,50
               </coordinates></LineString></Placemark></Document></kml>"#,
        )
        .unwrap();
        assert!(adapter.sync(&mut ctx, None).await.is_err());
        assert_eq!(ctx.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backwards_dates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let mut adapter = trip(dir.path());
        adapter.end_date = NaiveDate::from_ymd_opt(2023, 4, 30).unwrap();
        assert!(adapter.sync(&mut ctx, None).await.is_err());
    }
}
