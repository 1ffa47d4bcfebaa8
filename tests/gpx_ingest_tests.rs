// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end ingestion of a local GPX folder: parse, normalize, store,
//! catalog projection, and re-ingest idempotence.

mod common;

use runsync::geo::codec;
use runsync::models::ActivityType;
use runsync::sync::files::FileAdapter;
use runsync::sync::run_adapter;
use runsync::track::TrackFormat;

#[tokio::test]
async fn test_gpx_folder_ingest_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let tracks = dir.path().join("tracks");
    std::fs::create_dir(&tracks).unwrap();
    std::fs::write(tracks.join("morning.gpx"), common::SAMPLE_GPX).unwrap();

    let mut ctx = common::test_context(dir.path());
    let mut adapter = FileAdapter::new(&tracks, TrackFormat::Gpx);

    let stored = run_adapter(&mut ctx, &mut adapter).await.unwrap();
    assert_eq!(stored, 1);

    let activities = ctx.store.list_all().unwrap();
    assert_eq!(activities.len(), 1);
    let a = &activities[0];
    assert_eq!(a.run_id, 1_682_928_000_000);
    assert_eq!(a.activity_type, ActivityType::Run);
    assert_eq!(a.elapsed_seconds, 120);
    assert!((a.length_m - 350.0).abs() < 350.0 * 0.05);
    assert_eq!(a.name, "Morning Run");
    assert!(a.elevation_gain_m.is_some());

    let decoded = codec::decode(a.summary_polyline.as_ref().unwrap()).unwrap();
    assert_eq!(decoded.len(), 3);
    assert!((decoded[0].0 - 39.9042).abs() < 1e-5);
    assert!((decoded[0].1 - 116.4074).abs() < 1e-5);

    // The catalog was projected alongside the store write
    let catalog: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ctx.config.catalog_path).unwrap()).unwrap();
    let entries = catalog.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["run_id"], 1_682_928_000_000i64);
    assert_eq!(entries[0]["type"], "Run");
    assert_eq!(entries[0]["start_date"], "2023-05-01T08:00:00Z");
    // Beijing wall clock
    assert_eq!(entries[0]["start_date_local"], "2023-05-01 16:00:00");

    // The sync log was flushed to disk
    assert!(ctx.config.sync_log_path.exists());
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let tracks = dir.path().join("tracks");
    std::fs::create_dir(&tracks).unwrap();
    std::fs::write(tracks.join("morning.gpx"), common::SAMPLE_GPX).unwrap();

    let mut ctx = common::test_context(dir.path());
    let mut adapter = FileAdapter::new(&tracks, TrackFormat::Gpx);
    assert_eq!(run_adapter(&mut ctx, &mut adapter).await.unwrap(), 1);

    // A fresh context reloads the sync log from disk, the way a second
    // process invocation would.
    let mut ctx = common::test_context(dir.path());
    let mut adapter = FileAdapter::new(&tracks, TrackFormat::Gpx);
    assert_eq!(run_adapter(&mut ctx, &mut adapter).await.unwrap(), 0);
    assert_eq!(ctx.store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_only_run_skips_other_types() {
    let ride = common::SAMPLE_GPX.replace("running", "cycling");

    let dir = tempfile::tempdir().unwrap();
    let tracks = dir.path().join("tracks");
    std::fs::create_dir(&tracks).unwrap();
    std::fs::write(tracks.join("ride.gpx"), ride).unwrap();

    let mut ctx = common::test_context(dir.path());
    ctx.only_run = true;
    let mut adapter = FileAdapter::new(&tracks, TrackFormat::Gpx);
    assert_eq!(run_adapter(&mut ctx, &mut adapter).await.unwrap(), 0);
    assert_eq!(ctx.store.count().unwrap(), 0);
}
