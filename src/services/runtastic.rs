// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runtastic (adidas Running) client: password login with a cookie
//! session, run-session listing, GPS trace normalization.
//!
//! Unlike Keep, the traces are already WGS-84, so no coordinate shift is
//! applied; everything else follows the same decode-then-normalize path.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType, TrackPoint};
use crate::services::http;
use crate::sync::Adapter;
use crate::time_utils;
use crate::track::{self, RawTrack};
use crate::AppContext;

const BASE_URL: &str = "https://www.runtastic.com";

/// Runtastic web-API client. Authentication is a login form that sets a
/// session cookie, so the client keeps a cookie store.
pub struct RuntasticClient {
    http: reqwest::Client,
    email: String,
    password: String,
}

impl RuntasticClient {
    pub fn new(email: String, password: String) -> Self {
        Self {
            http: http::cookie_client(),
            email,
            password,
        }
    }

    /// Login; the session lives in the cookie store, the returned value is
    /// the user id needed by the session endpoints.
    pub async fn authenticate(&self) -> Result<String> {
        let response = http::send_with_retry(
            self.http
                .post(format!("{}/webapps/services/auth/login", BASE_URL))
                .json(&serde_json::json!({
                    "email": self.email,
                    "password": self.password,
                })),
        )
        .await?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "Runtastic login failed with status {}",
                response.status()
            )));
        }
        let login: RuntasticLogin = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Bad Runtastic login response: {}", e)))?;
        tracing::info!(user_id = %login.user_id, "Runtastic login succeeded");
        Ok(login.user_id)
    }

    /// List run-session summaries updated after the given cursor.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        synced_until_ms: i64,
    ) -> Result<Vec<RuntasticSessionSummary>> {
        let response = http::send_with_retry(
            self.http
                .post(format!(
                    "{}/webapps/services/runsessions/v3/sync",
                    BASE_URL
                ))
                .json(&serde_json::json!({
                    "user_id": user_id,
                    "syncedUntil": synced_until_ms.to_string(),
                })),
        )
        .await?;
        let sync: RuntasticSync = http::check_response_json(response).await?;
        Ok(sync.sessions)
    }

    /// Fetch one session's detail including its GPS trace.
    pub async fn get_session(&self, session_id: &str) -> Result<RuntasticSession> {
        let response = http::send_with_retry(
            self.http
                .post(format!(
                    "{}/webapps/services/runsessions/v2/{}/details",
                    BASE_URL, session_id
                ))
                .json(&serde_json::json!({ "includeGpsTrace": true })),
        )
        .await?;
        let detail: RuntasticDetail = http::check_response_json(response).await?;
        Ok(detail.run_session)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntasticLogin {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RuntasticSync {
    #[serde(default)]
    sessions: Vec<RuntasticSessionSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntasticSessionSummary {
    pub id: String,
    /// Start time, epoch milliseconds.
    pub start_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntasticDetail {
    run_session: RuntasticSession,
}

/// One run session with its trace.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntasticSession {
    pub id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds.
    pub end_time: i64,
    /// Moving time in milliseconds.
    pub duration: i64,
    /// Distance in meters.
    pub distance: f64,
    pub pulse_avg: Option<f64>,
    #[serde(default)]
    pub gps_trace: Vec<RuntasticPoint>,
}

/// One GPS sample, WGS-84.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntasticPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl RuntasticSession {
    fn points(&self) -> Vec<TrackPoint> {
        self.gps_trace
            .iter()
            .filter_map(|p| {
                let time = Utc.timestamp_millis_opt(p.timestamp).single()?;
                Some(TrackPoint {
                    lat: p.latitude,
                    lon: p.longitude,
                    elevation_m: p.altitude,
                    time: Some(time),
                    heart_rate: None,
                })
            })
            .collect()
    }

    /// Normalize into the canonical record; sessions without a trace are
    /// synthesized from the summary numbers alone.
    pub fn to_canonical(&self, ctx: &AppContext) -> Result<Activity> {
        let points = self.points();
        if points.len() >= 2 {
            let raw = RawTrack {
                points,
                sport: Some("running".to_string()),
                total_distance_m: Some(self.distance),
                total_moving_seconds: Some(self.duration / 1000),
                name: None,
            };
            let parsed = track::summarize(raw, Path::new(&self.id), "runtastic", &ctx.config)?;
            let mut activity = parsed.activity;
            activity.average_heartrate_bpm = activity.average_heartrate_bpm.or(self.pulse_avg);
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
        let moving_seconds = (self.duration / 1000).min(elapsed_seconds);

        let offset = time_utils::local_offset(start_utc, None, &ctx.config.default_timezone);
        Ok(Activity {
            run_id: self.start_time,
            name: Activity::default_name(ActivityType::Run, "runtastic"),
            activity_type: ActivityType::Run,
            subtype: Some("running".to_string()),
            start_time_utc: start_utc,
            start_time_local: time_utils::format_local(start_utc.with_timezone(&offset)),
            end_time_local: time_utils::format_local(end_utc.with_timezone(&offset)),
            length_m: self.distance,
            moving_seconds,
            elapsed_seconds,
            average_speed_mps: Activity::compute_average_speed(self.distance, moving_seconds),
            elevation_gain_m: None,
            average_heartrate_bpm: self.pulse_avg,
            start_latlng: None,
            summary_polyline: None,
            location_country: None,
            source: "runtastic".to_string(),
        })
    }
}

/// Order session summaries oldest-first, dropping those at or before the
/// cursor. Storing oldest-first keeps the cursor from advancing past a
/// session that later fails to fetch.
fn pending_oldest_first(
    mut summaries: Vec<RuntasticSessionSummary>,
    cursor_ms: i64,
) -> Vec<RuntasticSessionSummary> {
    summaries.retain(|s| s.start_time > cursor_ms);
    summaries.sort_by_key(|s| s.start_time);
    summaries
}

/// Runtastic sync adapter.
pub struct RuntasticAdapter {
    client: RuntasticClient,
}

impl RuntasticAdapter {
    pub fn new(email: String, password: String) -> Self {
        Self {
            client: RuntasticClient::new(email, password),
        }
    }
}

#[async_trait]
impl Adapter for RuntasticAdapter {
    fn source(&self) -> &'static str {
        "runtastic"
    }

    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize> {
        let user_id = self.client.authenticate().await?;
        let cursor_ms = since.map(|t| t.timestamp_millis()).unwrap_or(0);

        let sessions = self.client.list_sessions(&user_id, cursor_ms).await?;
        let mut stored = 0usize;
        for summary in pending_oldest_first(sessions, cursor_ms) {
            let session = self.client.get_session(&summary.id).await?;
            match session.to_canonical(ctx) {
                Ok(activity) => {
                    if ctx.finish_activity(activity)? {
                        stored += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(session = %summary.id, error = %e, "Skipping session");
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

    fn session(trace: Vec<RuntasticPoint>) -> RuntasticSession {
        RuntasticSession {
            id: "s1".to_string(),
            start_time: 1_682_928_000_000,
            end_time: 1_682_928_120_000,
            duration: 110_000,
            distance: 350.0,
            pulse_avg: Some(145.0),
            gps_trace: trace,
        }
    }

    fn point(lat: f64, lon: f64, offset_ms: i64) -> RuntasticPoint {
        RuntasticPoint {
            latitude: lat,
            longitude: lon,
            timestamp: 1_682_928_000_000 + offset_ms,
            altitude: None,
        }
    }

    #[test]
    fn test_session_with_trace_keeps_raw_coordinates() {
        let ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let s = session(vec![
            point(39.9042, 116.4074, 0),
            point(39.9050, 116.4090, 60_000),
            point(39.9060, 116.4110, 120_000),
        ]);
        let a = s.to_canonical(&ctx).unwrap();
        assert_eq!(a.run_id, 1_682_928_000_000);
        // No GCJ-02 shift: the first point survives exactly
        assert_eq!(a.start_latlng, Some((39.9042, 116.4074)));
        assert_eq!(a.moving_seconds, 110);
        assert_eq!(a.average_heartrate_bpm, Some(145.0));
        assert_eq!(a.source, "runtastic");
    }

    #[test]
    fn test_sessions_are_processed_oldest_first() {
        let summaries = vec![
            RuntasticSessionSummary { id: "s3".to_string(), start_time: 3_000 },
            RuntasticSessionSummary { id: "s1".to_string(), start_time: 1_000 },
            RuntasticSessionSummary { id: "s2".to_string(), start_time: 2_000 },
        ];
        let ordered = pending_oldest_first(summaries, 1_000);
        let ids: Vec<&str> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s2", "s3"]);
    }

    #[test]
    fn test_session_without_trace_is_synthesized() {
        let ctx = AppContext::open_in_memory(Config::default()).unwrap();
        let a = session(Vec::new()).to_canonical(&ctx).unwrap();
        assert_eq!(a.elapsed_seconds, 120);
        assert_eq!(a.moving_seconds, 110);
        assert_eq!(a.summary_polyline, None);
        assert_eq!(a.name, "Run from runtastic");
    }
}
