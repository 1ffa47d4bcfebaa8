// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared HTTP plumbing for the provider clients: a client factory with
//! the crate-wide timeouts and a retry wrapper for transient failures.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// Connect timeout on every outbound request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Total read timeout on every outbound request.
const READ_TIMEOUT: Duration = Duration::from_secs(120);
/// Transient failures are retried this many times.
const MAX_ATTEMPTS: u32 = 3;

/// Build a reqwest client with the crate-wide timeouts.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Build a client that keeps cookies across requests (session-based
/// providers).
pub fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .cookie_store(true)
        .build()
        .unwrap_or_default()
}

/// Send a request, retrying transient network errors with exponential
/// backoff (1s, 2s, 4s). HTTP error statuses are not retried here; the
/// caller decides what a 4xx/5xx means for its provider.
pub async fn send_with_retry(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let mut backoff = Duration::from_secs(1);
    for attempt in 1..=MAX_ATTEMPTS {
        let cloned = request
            .try_clone()
            .ok_or_else(|| AppError::Network("request body is not retryable".to_string()))?;
        match cloned.send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                tracing::warn!(attempt, error = %e, "Transient network error, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(AppError::Network(e.to_string())),
        }
    }
    unreachable!("retry loop always returns")
}

/// Map an error status to the application error taxonomy and parse the
/// JSON body on success.
pub async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let response = check_response(response).await?;
    response
        .json()
        .await
        .map_err(|e| AppError::Network(format!("JSON parse error: {}", e)))
}

/// Map an error status to the application error taxonomy.
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        429 => {
            tracing::warn!("Provider rate limit hit (429)");
            Err(AppError::RateLimitExceeded)
        }
        401 | 403 => Err(AppError::Auth(format!("HTTP {}: {}", status, body))),
        _ => Err(AppError::Network(format!("HTTP {}: {}", status, body))),
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}
