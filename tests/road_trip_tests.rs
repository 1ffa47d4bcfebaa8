// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end KML road-trip ingestion through the shared runner.

mod common;

use chrono::NaiveDate;
use runsync::models::ActivityType;
use runsync::sync::kml_trip::RoadTripAdapter;
use runsync::sync::run_adapter;

const TRIP_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document><Placemark><name>Route</name><LineString><coordinates>
    116.4074,39.9042,50 115.0,38.0,100 113.2,36.1,200 111.5,34.3,300 108.9,34.2,400
  </coordinates></LineString></Placemark></Document>
</kml>"#;

#[tokio::test]
async fn test_road_trip_ingest_and_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let kml_path = dir.path().join("trip.kml");
    std::fs::write(&kml_path, TRIP_KML).unwrap();

    let mut ctx = common::test_context(dir.path());
    let mut adapter = RoadTripAdapter {
        kml_path: kml_path.clone(),
        name: "Beijing to Xi'an".to_string(),
        start_date: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 10, 12).unwrap(),
        hours_per_day: 6,
        distance_km: 4000.0,
        is_gcj02: false,
    };

    assert_eq!(run_adapter(&mut ctx, &mut adapter).await.unwrap(), 1);

    let activities = ctx.store.list_all().unwrap();
    let a = &activities[0];
    assert_eq!(a.activity_type, ActivityType::RoadTrip);
    assert_eq!(a.length_m, 4_000_000.0);
    assert_eq!(a.moving_seconds, 12 * 6 * 3600);
    assert!((a.average_speed_mps - 15.43).abs() < 0.01);
    assert_eq!(a.name, "Beijing to Xi'an");

    let catalog: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ctx.config.catalog_path).unwrap()).unwrap();
    assert_eq!(catalog[0]["type"], "RoadTrip");
    assert_eq!(catalog[0]["distance"], 4_000_000.0);
    assert_eq!(catalog[0]["moving_time"], 259_200);

    // Same file, second invocation: nothing new
    let mut adapter = RoadTripAdapter {
        kml_path,
        name: "Beijing to Xi'an".to_string(),
        start_date: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 10, 12).unwrap(),
        hours_per_day: 6,
        distance_km: 4000.0,
        is_gcj02: false,
    };
    assert_eq!(run_adapter(&mut ctx, &mut adapter).await.unwrap(), 0);
    assert_eq!(ctx.store.count().unwrap(), 1);
}
