// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client: incremental activity sync and track upload.
//!
//! Handles:
//! - OAuth refresh-token exchange (the long-lived refresh token is traded
//!   for a short-lived access token on every run)
//! - Paginated activity listing with detail supplement
//! - File upload with status polling
//! - Rate-limit accounting via the response headers

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType};
use crate::services::http;
use crate::services::rate_limit::RateLimiter;
use crate::sync::Adapter;
use crate::AppContext;

/// Total wall-clock budget for upload status polling.
const UPLOAD_POLL_BUDGET: Duration = Duration::from_secs(30);

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            http: http::client(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            client_id,
            client_secret,
            refresh_token,
        }
    }

    /// Exchange the refresh token for a short-lived access token.
    pub async fn authenticate(&self) -> Result<String> {
        let response = http::send_with_retry(self.http.post(format!("{}/oauth/token", self.base_url)).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]))
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Token refresh failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Bad token response: {}", e)))?;
        tracing::info!("Strava access token refreshed");
        Ok(token.access_token)
    }

    /// List activity summaries starting after a Unix timestamp, oldest
    /// first (paginated).
    pub async fn list_activities(
        &self,
        access_token: &str,
        limiter: &mut RateLimiter,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>> {
        limiter.acquire().await?;
        let response = http::send_with_retry(
            self.http
                .get(format!("{}/athlete/activities", self.base_url))
                .bearer_auth(access_token)
                .query(&[
                    ("after", after.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ]),
        )
        .await?;
        self.reconcile(limiter, &response);
        checked_json(limiter, response).await
    }

    /// Get a detailed activity by ID (supplements missing summary fields).
    pub async fn get_activity(
        &self,
        access_token: &str,
        limiter: &mut RateLimiter,
        activity_id: i64,
    ) -> Result<StravaActivity> {
        limiter.acquire().await?;
        let response = http::send_with_retry(
            self.http
                .get(format!("{}/activities/{}", self.base_url, activity_id))
                .bearer_auth(access_token),
        )
        .await?;
        self.reconcile(limiter, &response);
        checked_json(limiter, response).await
    }

    /// Upload a local track file, poll until the server has processed it,
    /// and return the created activity id.
    pub async fn upload(
        &self,
        access_token: &str,
        limiter: &mut RateLimiter,
        path: &Path,
        data_type: &str,
    ) -> Result<i64> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("data_type", data_type.to_string());

        limiter.acquire().await?;
        let response = self
            .http
            .post(format!("{}/uploads", self.base_url))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?;
        self.reconcile(limiter, &response);
        let upload: UploadStatus = checked_json(limiter, response).await?;

        self.poll_upload(access_token, limiter, upload, path).await
    }

    /// Poll the upload status with 1s -> 2s -> 4s backoff, capped at 30s
    /// total.
    async fn poll_upload(
        &self,
        access_token: &str,
        limiter: &mut RateLimiter,
        mut upload: UploadStatus,
        path: &Path,
    ) -> Result<i64> {
        let mut backoff = Duration::from_secs(1);
        let mut waited = Duration::ZERO;

        loop {
            if let Some(error) = upload.error.filter(|e| !e.is_empty()) {
                return Err(AppError::UploadFailed {
                    id: upload.id.to_string(),
                    reason: error,
                });
            }
            if let Some(activity_id) = upload.activity_id {
                tracing::info!(activity_id, file = %path.display(), "Upload processed");
                return Ok(activity_id);
            }
            if waited >= UPLOAD_POLL_BUDGET {
                return Err(AppError::UploadFailed {
                    id: upload.id.to_string(),
                    reason: format!("still processing after {:?}", UPLOAD_POLL_BUDGET),
                });
            }

            tokio::time::sleep(backoff).await;
            waited += backoff;
            backoff = (backoff * 2).min(Duration::from_secs(4));

            limiter.acquire().await?;
            let response = http::send_with_retry(
                self.http
                    .get(format!("{}/uploads/{}", self.base_url, upload.id))
                    .bearer_auth(access_token),
            )
            .await?;
            self.reconcile(limiter, &response);
            upload = checked_json(limiter, response).await?;
        }
    }

    /// Adopt the server's authoritative rate-limit counters.
    fn reconcile(&self, limiter: &mut RateLimiter, response: &reqwest::Response) {
        let headers = response.headers();
        if let (Some(usage), Some(limit)) = (
            headers.get("X-RateLimit-Usage").and_then(|v| v.to_str().ok()),
            headers.get("X-RateLimit-Limit").and_then(|v| v.to_str().ok()),
        ) {
            limiter.reconcile(usage, limit);
        }
    }
}

/// Parse a checked JSON response, recording a server-side 429 in the
/// limiter's state before surfacing it.
async fn checked_json<T: serde::de::DeserializeOwned>(
    limiter: &mut RateLimiter,
    response: reqwest::Response,
) -> Result<T> {
    match http::check_response_json(response).await {
        Err(AppError::RateLimitExceeded) => {
            limiter.note_exceeded();
            Err(AppError::RateLimitExceeded)
        }
        other => other,
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
}

/// Upload status record; `activity_id` stays null until the server has
/// processed the file.
#[derive(Debug, Clone, Deserialize)]
struct UploadStatus {
    id: i64,
    activity_id: Option<i64>,
    error: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: i64,
    #[serde(alias = "sport_type", alias = "type")]
    pub activity_type: String,
    pub start_date: String,
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: i64,
    pub name: String,
    #[serde(alias = "sport_type", alias = "type")]
    pub activity_type: String,
    pub start_date: String,
    pub start_date_local: String,
    pub distance: f64,
    pub moving_time: i64,
    pub elapsed_time: i64,
    pub total_elevation_gain: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub start_latlng: Option<Vec<f64>>,
    pub location_country: Option<String>,
    pub map: Option<StravaMap>,
}

/// Activity map data with polylines.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    pub polyline: Option<String>,
    pub summary_polyline: Option<String>,
}

impl StravaActivity {
    /// Get the detailed polyline, falling back to summary if not available.
    pub fn get_polyline(&self) -> Option<&str> {
        let map = self.map.as_ref()?;
        map.polyline
            .as_deref()
            .or(map.summary_polyline.as_deref())
            .filter(|p| !p.is_empty())
    }

    /// Convert to the canonical record. Fails on unknown activity types;
    /// the caller logs and skips.
    pub fn to_canonical(&self) -> Result<Activity> {
        let activity_type = ActivityType::from_provider(&self.activity_type).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Unknown Strava activity type {:?}",
                self.activity_type
            ))
        })?;

        let start_utc = DateTime::parse_from_rfc3339(&self.start_date)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad start_date: {}", e)))?
            .with_timezone(&Utc);
        // start_date_local is a wall-clock time with a fake Z suffix
        let start_local = DateTime::parse_from_rfc3339(&self.start_date_local)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad start_date_local: {}", e)))?
            .naive_utc();
        let end_local = start_local + chrono::Duration::seconds(self.elapsed_time);

        let start_latlng = self.start_latlng.as_ref().and_then(|v| {
            if v.len() == 2 {
                Some((v[0], v[1]))
            } else {
                None
            }
        });

        Ok(Activity {
            run_id: self.id,
            name: self.name.clone(),
            activity_type,
            subtype: Some(self.activity_type.clone()),
            start_time_utc: start_utc,
            start_time_local: start_local.format("%Y-%m-%d %H:%M:%S").to_string(),
            end_time_local: end_local.format("%Y-%m-%d %H:%M:%S").to_string(),
            length_m: self.distance,
            moving_seconds: self.moving_time,
            elapsed_seconds: self.elapsed_time,
            average_speed_mps: Activity::compute_average_speed(self.distance, self.moving_time),
            elevation_gain_m: self.total_elevation_gain,
            average_heartrate_bpm: self.average_heartrate,
            start_latlng,
            summary_polyline: self.get_polyline().map(str::to_string),
            location_country: self.location_country.clone(),
            source: "strava".to_string(),
        })
    }
}

/// Strava sync adapter: list new summaries, supplement with detail, store.
pub struct StravaAdapter {
    client: StravaClient,
}

impl StravaAdapter {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client: StravaClient::new(client_id, client_secret, refresh_token),
        }
    }
}

#[async_trait]
impl Adapter for StravaAdapter {
    fn source(&self) -> &'static str {
        "strava"
    }

    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize> {
        let access_token = self.client.authenticate().await?;
        let after = since.map(|t| t.timestamp()).unwrap_or(0);
        let per_page = ctx.config.per_page;

        let mut stored = 0usize;
        let mut page = 1u32;
        loop {
            let summaries = self
                .client
                .list_activities(&access_token, &mut ctx.limiter, after, page, per_page)
                .await?;
            if summaries.is_empty() {
                break;
            }
            let page_len = summaries.len();

            for summary in summaries {
                if ctx.only_run
                    && ActivityType::from_provider(&summary.activity_type)
                        != Some(ActivityType::Run)
                {
                    continue;
                }

                let detail = self
                    .client
                    .get_activity(&access_token, &mut ctx.limiter, summary.id)
                    .await?;
                match detail.to_canonical() {
                    Ok(activity) => {
                        if ctx.finish_activity(activity)? {
                            stored += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!(activity_id = summary.id, error = %e, "Skipping activity");
                    }
                }
            }

            if page_len < per_page as usize {
                break;
            }
            page += 1;
        }

        Ok(stored)
    }
}
