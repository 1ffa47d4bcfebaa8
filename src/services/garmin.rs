// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect client: session-secret auth, activity list, file
//! downloads, upload.
//!
//! Garmin has no public OAuth app flow for personal use; instead a
//! previously captured OAuth token blob (the "session secret") is replayed
//! to mint a short-lived connectapi bearer token. The global and China
//! deployments are separate services with separate hosts; `--is-cn` picks
//! the latter and marks downloaded coordinates as GCJ-02.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::geo::{codec, gcj02};
use crate::services::http;
use crate::sync::Adapter;
use crate::track::{self, TrackFormat};
use crate::AppContext;

/// Activities fetched per list page.
const PAGE_SIZE: u32 = 100;
/// Concurrent file downloads per batch.
const DOWNLOAD_CONCURRENCY: usize = 10;

/// Garmin Connect API client.
#[derive(Clone)]
pub struct GarminClient {
    http: reqwest::Client,
    base_url: String,
    sso_url: String,
    secret: String,
    is_cn: bool,
}

impl GarminClient {
    pub fn new(secret: String, is_cn: bool) -> Self {
        let (base_url, sso_url) = if is_cn {
            (
                "https://connectapi.garmin.cn".to_string(),
                "https://connectapi.garmin.cn/oauth-service".to_string(),
            )
        } else {
            (
                "https://connectapi.garmin.com".to_string(),
                "https://connectapi.garmin.com/oauth-service".to_string(),
            )
        };
        Self {
            http: http::client(),
            base_url,
            sso_url,
            secret,
            is_cn,
        }
    }

    /// Exchange the stored token blob for a bearer token.
    pub async fn authenticate(&self) -> Result<String> {
        let response = http::send_with_retry(
            self.http
                .post(format!("{}/oauth/exchange/user/2.0", self.sso_url))
                .header("Authorization", format!("OAuth {}", self.secret.trim()))
                .header("Content-Type", "application/x-www-form-urlencoded"),
        )
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Auth(format!(
                "Garmin token exchange failed with status {}; secret may be stale",
                status
            )));
        }
        let token: GarminToken = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Bad Garmin token response: {}", e)))?;
        tracing::info!(is_cn = self.is_cn, "Garmin session established");
        Ok(token.access_token)
    }

    /// List activity summaries, newest first, one page at a time.
    pub async fn list_activities(
        &self,
        token: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<GarminActivitySummary>> {
        let response = http::send_with_retry(
            self.http
                .get(format!(
                    "{}/activitylist-service/activities/search/activities",
                    self.base_url
                ))
                .bearer_auth(token)
                .query(&[("start", start.to_string()), ("limit", limit.to_string())]),
        )
        .await?;
        http::check_response_json(response).await
    }

    /// Download one activity as a GPX export into `dir`.
    pub async fn download_gpx(&self, token: &str, activity_id: i64, dir: &Path) -> Result<PathBuf> {
        let response = http::send_with_retry(
            self.http
                .get(format!(
                    "{}/download-service/export/gpx/activity/{}",
                    self.base_url, activity_id
                ))
                .bearer_auth(token),
        )
        .await?;
        let response = http::check_response(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Network(format!("Download body error: {}", e)))?;

        let path = dir.join(format!("{}.gpx", activity_id));
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            AppError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Upload a local track file back to Garmin.
    pub async fn upload(&self, token: &str, path: &Path) -> Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("gpx")
            .to_ascii_lowercase();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("upload.{}", ext));

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name),
        );
        let response = self
            .http
            .post(format!("{}/upload-service/upload/.{}", self.base_url, ext))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        http::check_response(response).await?;
        tracing::info!(file = %path.display(), "Uploaded to Garmin");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GarminToken {
    access_token: String,
}

/// Garmin activity summary, just the fields the sync needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivitySummary {
    pub activity_id: i64,
    /// Start time in GMT, `"2023-05-01 08:00:00"`.
    #[serde(rename = "startTimeGMT")]
    pub start_time_gmt: String,
}

impl GarminActivitySummary {
    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.start_time_gmt, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|t| DateTime::from_naive_utc_and_offset(t, Utc))
    }
}

/// Garmin sync adapter: list new activities, download, parse, store.
pub struct GarminAdapter {
    client: GarminClient,
    is_cn: bool,
}

impl GarminAdapter {
    pub fn new(secret: String, is_cn: bool) -> Self {
        Self {
            client: GarminClient::new(secret, is_cn),
            is_cn,
        }
    }

    /// Enumerate activity ids newer than the cursor, oldest first.
    async fn new_activity_ids(
        &self,
        token: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        let mut start = 0u32;
        'pages: loop {
            let page = self.client.list_activities(token, start, PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            // The list is newest-first, so the first already-seen activity
            // ends the walk.
            for summary in page {
                if let (Some(cursor), Some(started)) = (since, summary.start_time_utc()) {
                    if started <= cursor {
                        break 'pages;
                    }
                }
                ids.push(summary.activity_id);
            }

            if page_len < PAGE_SIZE as usize {
                break;
            }
            start += PAGE_SIZE;
        }
        ids.reverse();
        Ok(ids)
    }
}

#[async_trait]
impl Adapter for GarminAdapter {
    fn source(&self) -> &'static str {
        "garmin"
    }

    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize> {
        let token = self.client.authenticate().await?;
        let ids = self.new_activity_ids(&token, since).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let dir = ctx.config.download_dir("garmin");
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        // Downloads overlap; parsing and store writes stay sequential.
        let downloads: Vec<(i64, Result<PathBuf>)> = stream::iter(ids)
            .map(|id| {
                let client = self.client.clone();
                let token = token.clone();
                let dir = dir.clone();
                async move { (id, client.download_gpx(&token, id, &dir).await) }
            })
            .buffer_unordered(DOWNLOAD_CONCURRENCY)
            .collect()
            .await;

        let mut stored = 0usize;
        for (id, download) in downloads {
            let path = match download {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!(activity_id = id, error = %e, "Download failed, skipping");
                    continue;
                }
            };
            match track::parse_track(&path, TrackFormat::Gpx, &ctx.config) {
                Ok(parsed) => {
                    let mut activity = parsed.activity;
                    activity.run_id = id;
                    activity.source = "garmin".to_string();
                    if self.is_cn {
                        shift_to_wgs84(&mut activity)?;
                    }
                    if ctx.finish_activity(activity)? {
                        stored += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(activity_id = id, error = %e, "Skipping unparseable download");
                }
            }
        }
        Ok(stored)
    }
}

/// Shift a GCJ-02 activity's stored coordinates to WGS-84.
fn shift_to_wgs84(activity: &mut crate::models::Activity) -> Result<()> {
    if let Some((lat, lon)) = activity.start_latlng {
        activity.start_latlng = Some(gcj02::gcj02_to_wgs84(lat, lon));
    }
    if let Some(encoded) = activity.summary_polyline.take() {
        let shifted = gcj02::shift_series_to_wgs84(&codec::decode(&encoded)?);
        activity.summary_polyline = Some(codec::encode(&shifted)?);
    }
    Ok(())
}
