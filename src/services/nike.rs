// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nike Run Club client: refresh-token auth, activity snapshots, GPX
//! conversion.
//!
//! Nike's API returns each activity as one JSON snapshot with parallel
//! metric streams (latitude, longitude, elevation, heart_rate), each a list
//! of `{start_epoch_ms, value}` samples. The adapter persists the raw
//! snapshot, folds the streams into one point series, and additionally
//! renders a GPX file so the activity can be re-uploaded to Strava.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::TrackPoint;
use crate::services::http;
use crate::sync::Adapter;
use crate::track::{self, writer, RawTrack};
use crate::AppContext;

const BASE_URL: &str = "https://api.nike.com";
/// Public client id of the official app; the refresh token is per-user.
const CLIENT_ID: &str = "VhAeafEGJ6G8e9DxRUz8iE50CZ9MiJMG";

/// Nike API client.
pub struct NikeClient {
    http: reqwest::Client,
    refresh_token: String,
}

impl NikeClient {
    pub fn new(refresh_token: String) -> Self {
        Self {
            http: http::client(),
            refresh_token,
        }
    }

    /// Exchange the refresh token for an access token.
    pub async fn authenticate(&self) -> Result<String> {
        let response = http::send_with_retry(
            self.http
                .post(format!("{}/idn/shim/oauth/2.0/token", BASE_URL))
                .json(&serde_json::json!({
                    "client_id": CLIENT_ID,
                    "grant_type": "refresh_token",
                    "refresh_token": self.refresh_token,
                })),
        )
        .await?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "Nike token refresh failed with status {}",
                response.status()
            )));
        }
        let token: NikeToken = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Bad Nike token response: {}", e)))?;
        tracing::info!("Nike access token refreshed");
        Ok(token.access_token)
    }

    /// List activity snapshots ending after the given epoch-ms cursor.
    pub async fn list_after(&self, token: &str, after_ms: i64) -> Result<NikeActivityPage> {
        let response = http::send_with_retry(
            self.http
                .get(format!(
                    "{}/plus/v3/activities/after_time/{}",
                    BASE_URL, after_ms
                ))
                .query(&[("limit", "30"), ("types", "run,jogging")])
                .bearer_auth(token),
        )
        .await?;
        http::check_response_json(response).await
    }

    /// Fetch one activity snapshot with all metric streams.
    pub async fn get_activity(&self, token: &str, id: &str) -> Result<NikeSnapshot> {
        let response = http::send_with_retry(
            self.http
                .get(format!("{}/plus/v3/activity/{}", BASE_URL, id))
                .query(&[("metrics", "ALL")])
                .bearer_auth(token),
        )
        .await?;
        http::check_response_json(response).await
    }
}

#[derive(Debug, Deserialize)]
struct NikeToken {
    access_token: String,
}

/// One page of the activity list.
#[derive(Debug, Deserialize)]
pub struct NikeActivityPage {
    #[serde(default)]
    pub activities: Vec<NikeSnapshot>,
    #[serde(default)]
    pub paging: NikePaging,
}

#[derive(Debug, Default, Deserialize)]
pub struct NikePaging {
    /// Cursor for the next page, absent on the last one.
    pub after_time: Option<i64>,
}

/// One activity snapshot. The list endpoint returns these without metric
/// streams; the detail endpoint fills `metrics`.
#[derive(Debug, Clone, Deserialize)]
pub struct NikeSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
    pub active_duration_ms: i64,
    #[serde(default)]
    pub summaries: Vec<NikeSummary>,
    #[serde(default)]
    pub metrics: Vec<NikeMetric>,
    #[serde(default)]
    pub tags: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NikeSummary {
    pub metric: String,
    pub summary: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NikeMetric {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub values: Vec<NikeSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NikeSample {
    pub start_epoch_ms: i64,
    pub value: f64,
}

impl NikeSnapshot {
    fn metric(&self, metric_type: &str) -> Option<&[NikeSample]> {
        self.metrics
            .iter()
            .find(|m| m.metric_type == metric_type)
            .map(|m| m.values.as_slice())
    }

    fn summary_total(&self, metric: &str) -> Option<f64> {
        self.summaries
            .iter()
            .find(|s| s.metric == metric && s.summary == "total")
            .map(|s| s.value)
    }

    fn summary_mean(&self, metric: &str) -> Option<f64> {
        self.summaries
            .iter()
            .find(|s| s.metric == metric && s.summary == "mean")
            .map(|s| s.value)
    }

    pub fn name(&self) -> Option<String> {
        self.tags
            .get("com.nike.name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Fold the latitude/longitude streams into one point series, joining
    /// elevation and heart rate by latest-sample-at-or-before each position
    /// timestamp. Returns empty when the snapshot has no GPS.
    pub fn points(&self) -> Vec<TrackPoint> {
        let (lats, lons) = match (self.metric("latitude"), self.metric("longitude")) {
            (Some(lats), Some(lons)) => (lats, lons),
            _ => return Vec::new(),
        };
        let elevations = self.metric("elevation").unwrap_or(&[]);
        let heart_rates = self.metric("heart_rate").unwrap_or(&[]);

        let mut elevation_idx = 0usize;
        let mut hr_idx = 0usize;
        lats.iter()
            .zip(lons.iter())
            .filter_map(|(lat, lon)| {
                let t_ms = lat.start_epoch_ms;
                let time = Utc.timestamp_millis_opt(t_ms).single()?;
                Some(TrackPoint {
                    lat: lat.value,
                    lon: lon.value,
                    elevation_m: latest_at(elevations, &mut elevation_idx, t_ms),
                    time: Some(time),
                    heart_rate: latest_at(heart_rates, &mut hr_idx, t_ms),
                })
            })
            .collect()
    }

    /// Normalize the snapshot into the canonical record.
    pub fn to_canonical(&self, ctx: &AppContext) -> Result<crate::models::Activity> {
        let points = self.points();
        if points.len() < 2 {
            return Err(AppError::parse(
                Path::new(&self.id),
                "snapshot has no usable GPS stream",
            ));
        }
        let raw = RawTrack {
            points,
            sport: Some(self.activity_type.clone()),
            // Nike reports distance in kilometers
            total_distance_m: self.summary_total("distance").map(|km| km * 1000.0),
            total_moving_seconds: Some(self.active_duration_ms / 1000),
            name: self.name(),
        };
        let parsed = track::summarize(raw, Path::new(&self.id), "nike", &ctx.config)?;
        let mut activity = parsed.activity;
        activity.average_heartrate_bpm = activity
            .average_heartrate_bpm
            .or_else(|| self.summary_mean("heart_rate"));
        Ok(activity)
    }
}

/// Advance `idx` to the last sample at or before `t_ms` and return it.
fn latest_at(samples: &[NikeSample], idx: &mut usize, t_ms: i64) -> Option<f64> {
    while *idx + 1 < samples.len() && samples[*idx + 1].start_epoch_ms <= t_ms {
        *idx += 1;
    }
    samples
        .get(*idx)
        .filter(|s| s.start_epoch_ms <= t_ms)
        .map(|s| s.value)
}

/// Nike sync adapter: snapshot download, GPX conversion, store.
pub struct NikeAdapter {
    client: NikeClient,
}

impl NikeAdapter {
    pub fn new(refresh_token: String) -> Self {
        Self {
            client: NikeClient::new(refresh_token),
        }
    }
}

#[async_trait]
impl Adapter for NikeAdapter {
    fn source(&self) -> &'static str {
        "nike"
    }

    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize> {
        let token = self.client.authenticate().await?;

        let snapshot_dir = ctx.config.download_dir("nike");
        let gpx_dir = ctx.config.download_dir("nike_gpx");
        for dir in [&snapshot_dir, &gpx_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        let mut stored = 0usize;
        let mut after_ms = since.map(|t| t.timestamp_millis()).unwrap_or(0);
        loop {
            let page = self.client.list_after(&token, after_ms).await?;
            if page.activities.is_empty() {
                break;
            }

            for summary in &page.activities {
                let snapshot = self.client.get_activity(&token, &summary.id).await?;

                let raw_path = snapshot_dir.join(format!("{}.json", snapshot.id));
                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "id": snapshot.id,
                    "type": snapshot.activity_type,
                    "start_epoch_ms": snapshot.start_epoch_ms,
                    "end_epoch_ms": snapshot.end_epoch_ms,
                    "active_duration_ms": snapshot.active_duration_ms,
                }))
                .map_err(|e| AppError::Storage(format!("Snapshot serialize error: {}", e)))?;
                std::fs::write(&raw_path, json).map_err(|e| {
                    AppError::Storage(format!("Failed to write {}: {}", raw_path.display(), e))
                })?;

                match snapshot.to_canonical(ctx) {
                    Ok(activity) => {
                        let points = snapshot.points();
                        let gpx_path = gpx_dir.join(format!("{}.gpx", activity.run_id));
                        if let Err(e) =
                            writer::write_gpx(&gpx_path, &activity.name, "running", &points)
                        {
                            tracing::warn!(id = %snapshot.id, error = %e, "GPX conversion failed");
                        }
                        if ctx.finish_activity(activity)? {
                            stored += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!(id = %snapshot.id, error = %e, "Skipping Nike activity");
                    }
                }
            }

            match page.paging.after_time {
                Some(next) if next > after_ms => after_ms = next,
                _ => break,
            }
        }
        Ok(stored)
    }
}
