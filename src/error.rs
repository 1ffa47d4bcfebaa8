// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! The policy follows a simple split: per-activity failures (a malformed
//! track file, a rejected upload) are logged and skipped so a sync can make
//! progress, while global failures (credentials, storage) abort the run.

use std::path::PathBuf;
use std::time::Duration;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Provider rejected request for quota")]
    RateLimitExceeded,

    #[error("Rate limit budget exhausted, retry after {retry_after:?}")]
    RateLimitTimeout { retry_after: Duration },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Upload of {id} failed: {reason}")]
    UploadFailed { id: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Missing required configuration: {0}")]
    Config(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a parse error for a given file.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is fatal for the whole run (vs. one activity).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Storage(_) | Self::Config(_) | Self::RateLimitExceeded
        )
    }

    /// Process exit code per the CLI contract: 1 for credential/config
    /// problems, 2 for unrecoverable HTTP errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Auth(_) | Self::Config(_) => 1,
            _ => 2,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
