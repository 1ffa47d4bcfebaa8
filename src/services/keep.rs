// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Keep client: mobile-API login, run log listing, points-blob decoding.
//!
//! Keep's mobile API returns each run's GPS trace as a signed URL pointing
//! at a base64-then-zlib JSON blob, with coordinates in GCJ-02. The
//! adapter decodes the blob, shifts the points to WGS-84, and runs them
//! through the shared track normalization.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use flate2::read::ZlibDecoder;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::geo::gcj02;
use crate::models::{Activity, ActivityType, TrackPoint};
use crate::services::http;
use crate::sync::Adapter;
use crate::time_utils;
use crate::track::{self, RawTrack};
use crate::AppContext;

const BASE_URL: &str = "https://api.gotokeep.com";

/// Keep mobile-API client.
pub struct KeepClient {
    http: reqwest::Client,
    mobile: String,
    password: String,
}

impl KeepClient {
    pub fn new(mobile: String, password: String) -> Self {
        Self {
            http: http::client(),
            mobile,
            password,
        }
    }

    /// Login with phone + password, returning the bearer token.
    pub async fn authenticate(&self) -> Result<String> {
        let response = http::send_with_retry(
            self.http
                .post(format!("{}/v1.1/users/login", BASE_URL))
                .json(&serde_json::json!({
                    "mobile": self.mobile,
                    "password": self.password,
                })),
        )
        .await?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "Keep login failed with status {}",
                response.status()
            )));
        }
        let login: KeepResponse<KeepLoginData> = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Bad Keep login response: {}", e)))?;
        tracing::info!("Keep login succeeded");
        Ok(login.data.token)
    }

    /// Fetch one page of run summaries, paged by the opaque `last_date`
    /// cursor Keep returns (0 starts from the newest).
    pub async fn list_runs(&self, token: &str, last_date: i64) -> Result<KeepRunPage> {
        let response = http::send_with_retry(
            self.http
                .get(format!("{}/pd/v3/stats/detail", BASE_URL))
                .query(&[
                    ("dateUnit", "all"),
                    ("type", "running"),
                    ("lastDate", &last_date.to_string()),
                ])
                .header("Authorization", format!("Bearer {}", token)),
        )
        .await?;
        let page: KeepResponse<KeepRunPage> = http::check_response_json(response).await?;
        Ok(page.data)
    }

    /// Fetch the detail record for one run.
    pub async fn get_run(&self, token: &str, run_id: &str) -> Result<KeepRunDetail> {
        let response = http::send_with_retry(
            self.http
                .get(format!("{}/pd/v3/runninglog/{}", BASE_URL, run_id))
                .header("Authorization", format!("Bearer {}", token)),
        )
        .await?;
        let detail: KeepResponse<KeepRunDetail> = http::check_response_json(response).await?;
        Ok(detail.data)
    }

    /// Download and decode a run's GPS points blob.
    pub async fn get_points(&self, url: &str) -> Result<Vec<KeepPoint>> {
        let response = http::send_with_retry(self.http.get(url)).await?;
        let response = http::check_response(response).await?;
        let blob = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Points blob read error: {}", e)))?;
        decode_points(&blob)
    }
}

/// Decode Keep's points payload: base64 text wrapping a zlib stream
/// wrapping a JSON array.
pub fn decode_points(blob: &str) -> Result<Vec<KeepPoint>> {
    use std::io::Read;

    let compressed = base64::engine::general_purpose::STANDARD
        .decode(blob.trim())
        .map_err(|e| AppError::Network(format!("Points blob is not base64: {}", e)))?;
    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| AppError::Network(format!("Points blob zlib error: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| AppError::Network(format!("Points blob JSON error: {}", e)))
}

#[derive(Debug, Deserialize)]
struct KeepResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct KeepLoginData {
    token: String,
}

/// One page of the run log.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepRunPage {
    pub records: Vec<KeepRunSummary>,
    /// Cursor for the next page; 0 when this is the last one.
    #[serde(default)]
    pub last_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepRunSummary {
    pub id: String,
    /// Start time, epoch milliseconds.
    pub start_time: i64,
}

/// Detail record for one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepRunDetail {
    pub id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds.
    pub end_time: i64,
    /// Moving time in seconds.
    pub duration: i64,
    /// Distance in meters.
    pub distance: f64,
    pub average_heartrate: Option<f64>,
    pub raw_data_url: Option<String>,
    pub name: Option<String>,
}

/// One decoded GPS sample, GCJ-02.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub hr: Option<f64>,
}

impl KeepRunDetail {
    /// Build the canonical record from the detail plus its decoded points
    /// (already shifted to WGS-84). Runs without a trace (treadmill) are
    /// synthesized from the summary numbers alone.
    pub fn to_canonical(&self, points: &[TrackPoint], ctx: &AppContext) -> Result<Activity> {
        if points.len() >= 2 {
            let raw = RawTrack {
                points: points.to_vec(),
                sport: Some("running".to_string()),
                total_distance_m: Some(self.distance),
                total_moving_seconds: Some(self.duration),
                name: self.name.clone(),
            };
            let parsed = track::summarize(raw, Path::new(&self.id), "keep", &ctx.config)?;
            let mut activity = parsed.activity;
            activity.average_heartrate_bpm =
                activity.average_heartrate_bpm.or(self.average_heartrate);
            return Ok(activity);
        }

        let start_utc = Utc
            .timestamp_millis_opt(self.start_time)
            .single()
            .ok_or_else(|| AppError::parse(Path::new(&self.id), "bad start timestamp"))?;
        let end_utc = Utc
            .timestamp_millis_opt(self.end_time)
            .single()
            .ok_or_else(|| AppError::parse(Path::new(&self.id), "bad end timestamp"))?;
        let elapsed_seconds = (end_utc - start_utc).num_seconds().max(0);

        let offset = time_utils::local_offset(start_utc, None, &ctx.config.default_timezone);
        Ok(Activity {
            run_id: self.start_time,
            name: self
                .name
                .clone()
                .unwrap_or_else(|| Activity::default_name(ActivityType::Run, "keep")),
            activity_type: ActivityType::Run,
            subtype: Some("running".to_string()),
            start_time_utc: start_utc,
            start_time_local: time_utils::format_local(start_utc.with_timezone(&offset)),
            end_time_local: time_utils::format_local(end_utc.with_timezone(&offset)),
            length_m: self.distance,
            moving_seconds: self.duration.min(elapsed_seconds),
            elapsed_seconds,
            average_speed_mps: Activity::compute_average_speed(
                self.distance,
                self.duration.min(elapsed_seconds),
            ),
            elevation_gain_m: None,
            average_heartrate_bpm: self.average_heartrate,
            start_latlng: None,
            summary_polyline: None,
            location_country: None,
            source: "keep".to_string(),
        })
    }
}

/// Convert decoded Keep points (GCJ-02) into WGS-84 track points.
pub fn to_track_points(points: &[KeepPoint]) -> Vec<TrackPoint> {
    points
        .iter()
        .filter_map(|p| {
            let (lat, lon) = gcj02::gcj02_to_wgs84(p.latitude, p.longitude);
            let time = Utc.timestamp_millis_opt(p.timestamp).single()?;
            Some(TrackPoint {
                lat,
                lon,
                elevation_m: None,
                time: Some(time),
                heart_rate: p.hr,
            })
        })
        .collect()
}

/// Order run summaries oldest-first, dropping those at or before the
/// cursor. Storing oldest-first keeps the cursor from advancing past a run
/// that later fails to fetch.
fn pending_oldest_first(
    mut summaries: Vec<KeepRunSummary>,
    cursor_ms: i64,
) -> Vec<KeepRunSummary> {
    summaries.retain(|s| s.start_time > cursor_ms);
    summaries.sort_by_key(|s| s.start_time);
    summaries
}

/// Keep sync adapter.
pub struct KeepAdapter {
    client: KeepClient,
}

impl KeepAdapter {
    pub fn new(mobile: String, password: String) -> Self {
        Self {
            client: KeepClient::new(mobile, password),
        }
    }
}

#[async_trait]
impl Adapter for KeepAdapter {
    fn source(&self) -> &'static str {
        "keep"
    }

    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize> {
        let token = self.client.authenticate().await?;
        let cursor_ms = since.map(|t| t.timestamp_millis()).unwrap_or(0);

        // The run log pages newest-first; collect the whole backlog before
        // fetching so storage can proceed oldest-first.
        let mut summaries = Vec::new();
        let mut last_date = 0i64;
        loop {
            let page = self.client.list_runs(&token, last_date).await?;
            if page.records.is_empty() {
                break;
            }
            summaries.extend(page.records);
            if page.last_timestamp <= 0 {
                break;
            }
            last_date = page.last_timestamp;
        }

        let mut stored = 0usize;
        for summary in pending_oldest_first(summaries, cursor_ms) {
            let detail = self.client.get_run(&token, &summary.id).await?;
            let points = match &detail.raw_data_url {
                Some(url) => to_track_points(&self.client.get_points(url).await?),
                None => Vec::new(),
            };
            match detail.to_canonical(&points, ctx) {
                Ok(activity) => {
                    if ctx.finish_activity(activity)? {
                        stored += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(run = %summary.id, error = %e, "Skipping Keep run");
                }
            }
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn encode_blob(points: &serde_json::Value) -> String {
        let json = serde_json::to_vec(points).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).unwrap();
        base64::engine::general_purpose::STANDARD.encode(encoder.finish().unwrap())
    }

    #[test]
    fn test_decode_points_round_trip() {
        let blob = encode_blob(&serde_json::json!([
            {"latitude": 39.9042, "longitude": 116.4074, "timestamp": 1_682_928_000_000_i64, "hr": 150.0},
            {"latitude": 39.9050, "longitude": 116.4090, "timestamp": 1_682_928_060_000_i64},
        ]));
        let points = decode_points(&blob).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].hr, Some(150.0));
        assert_eq!(points[1].hr, None);
    }

    #[test]
    fn test_decode_points_rejects_garbage() {
        assert!(decode_points("not base64 at all!!!").is_err());
        let not_zlib = base64::engine::general_purpose::STANDARD.encode(b"plain");
        assert!(decode_points(&not_zlib).is_err());
    }

    #[test]
    fn test_track_points_are_shifted_to_wgs84() {
        let raw = vec![KeepPoint {
            latitude: 39.9042,
            longitude: 116.4074,
            timestamp: 1_682_928_000_000,
            hr: None,
        }];
        let points = to_track_points(&raw);
        assert_eq!(points.len(), 1);
        assert_ne!((points[0].lat, points[0].lon), (39.9042, 116.4074));
        assert!((points[0].lat - 39.9042).abs() < 0.01);
    }

    #[test]
    fn test_runs_are_processed_oldest_first() {
        // The API lists newest-first; storage order must be ascending so a
        // mid-sync failure never leaves an older run behind the cursor.
        let summaries = vec![
            KeepRunSummary { id: "c".to_string(), start_time: 3_000 },
            KeepRunSummary { id: "b".to_string(), start_time: 2_000 },
            KeepRunSummary { id: "a".to_string(), start_time: 1_000 },
        ];
        let ordered = pending_oldest_first(summaries, 1_000);
        let ids: Vec<&str> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn test_treadmill_run_without_trace() {
        let ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let detail = KeepRunDetail {
            id: "abc_123".to_string(),
            start_time: 1_682_928_000_000,
            end_time: 1_682_929_800_000,
            duration: 1500,
            distance: 5000.0,
            average_heartrate: Some(148.0),
            raw_data_url: None,
            name: None,
        };
        let a = detail.to_canonical(&[], &ctx).unwrap();
        assert_eq!(a.run_id, 1_682_928_000_000);
        assert_eq!(a.elapsed_seconds, 1800);
        assert_eq!(a.moving_seconds, 1500);
        assert_eq!(a.summary_polyline, None);
        assert_eq!(a.name, "Run from keep");
        assert_eq!(a.source, "keep");
    }

    #[test]
    fn test_run_with_trace_goes_through_normalization() {
        let ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let detail = KeepRunDetail {
            id: "abc_123".to_string(),
            start_time: 1_682_928_000_000,
            end_time: 1_682_928_120_000,
            duration: 110,
            distance: 350.0,
            average_heartrate: None,
            raw_data_url: Some("unused".to_string()),
            name: Some("Evening run".to_string()),
        };
        let raw = vec![
            KeepPoint { latitude: 39.9042, longitude: 116.4074, timestamp: 1_682_928_000_000, hr: None },
            KeepPoint { latitude: 39.9050, longitude: 116.4090, timestamp: 1_682_928_060_000, hr: None },
            KeepPoint { latitude: 39.9060, longitude: 116.4110, timestamp: 1_682_928_120_000, hr: None },
        ];
        let a = detail.to_canonical(&to_track_points(&raw), &ctx).unwrap();
        assert_eq!(a.run_id, 1_682_928_000_000);
        assert_eq!(a.moving_seconds, 110);
        assert_eq!(a.length_m, 350.0);
        assert_eq!(a.name, "Evening run");
        assert!(a.summary_polyline.is_some());
    }
}
