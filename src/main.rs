// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! runsync CLI
//!
//! Pulls workouts from one chosen source per invocation, normalizes them
//! into the local store, and regenerates the JSON catalog.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runsync::config::Config;
use runsync::error::{AppError, Result};
use runsync::services::garmin::GarminAdapter;
use runsync::services::keep::KeepAdapter;
use runsync::services::nike::NikeAdapter;
use runsync::services::rate_limit::RateLimiter;
use runsync::services::runtastic::RuntasticAdapter;
use runsync::services::strava::{StravaAdapter, StravaClient};
use runsync::sync::files::FileAdapter;
use runsync::sync::kml_trip::RoadTripAdapter;
use runsync::sync;
use runsync::track::TrackFormat;
use runsync::AppContext;

#[derive(Parser)]
#[command(name = "runsync", about = "Personal fitness-activity aggregator", version)]
struct Cli {
    /// Ingest only activities of type Run
    #[arg(long, global = true)]
    only_run: bool,

    /// Ignore the sync cursor and re-ingest everything
    #[arg(long, global = true)]
    all: bool,

    /// Fail fast when the rate-limit budget is exhausted instead of waiting
    #[arg(long, global = true)]
    fail_fast: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync from Strava
    Strava(StravaArgs),
    /// Sync from Garmin Connect
    Garmin {
        /// Serialized session secret (token blob)
        secret: String,
        /// Use the China regional endpoint (coordinates arrive as GCJ-02)
        #[arg(long)]
        is_cn: bool,
    },
    /// Sync from Keep
    Keep {
        /// Account phone number
        mobile: String,
        password: String,
    },
    /// Sync from Nike Run Club
    Nike {
        /// OAuth refresh token
        refresh_token: String,
    },
    /// Sync from Runtastic / adidas Running
    Runtastic {
        email: String,
        password: String,
    },
    /// Ingest local GPX files
    Gpx(FolderArgs),
    /// Ingest local TCX files
    Tcx(FolderArgs),
    /// Ingest local FIT files
    Fit(FolderArgs),
    /// Ingest one KML road trip
    Kml {
        /// Path to the KML file containing a LineString
        path: PathBuf,
        #[arg(long)]
        name: String,
        /// First day of the trip, YYYY-MM-DD
        #[arg(long)]
        start_date: NaiveDate,
        /// Last day of the trip, inclusive, YYYY-MM-DD
        #[arg(long)]
        end_date: NaiveDate,
        /// Hours on the road per day
        #[arg(long, default_value_t = 8)]
        hours_per_day: i64,
        /// Total trip distance in kilometers
        #[arg(long)]
        distance_km: f64,
        /// Route coordinates are GCJ-02
        #[arg(long)]
        is_cn: bool,
    },
    /// Upload local track files to Strava
    StravaUpload {
        #[command(flatten)]
        credentials: StravaArgs,
        /// Files to upload (gpx, tcx, or fit)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct StravaArgs {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Args)]
struct FolderArgs {
    /// Folder to walk; defaults to the per-format data directory
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Run failed");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Configuration error");
        AppError::Config("environment")
    })?;

    let limiter = match cli.command {
        Command::Strava(_) | Command::StravaUpload { .. } => {
            RateLimiter::strava_default(cli.fail_fast)
        }
        _ => RateLimiter::unlimited(),
    };

    let mut ctx = AppContext::open(config, limiter)?;
    ctx.only_run = cli.only_run;
    ctx.refresh_all = cli.all;

    let stored = match cli.command {
        Command::Strava(args) => {
            let mut adapter =
                StravaAdapter::new(args.client_id, args.client_secret, args.refresh_token);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Garmin { secret, is_cn } => {
            let mut adapter = GarminAdapter::new(secret, is_cn);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Keep { mobile, password } => {
            let mut adapter = KeepAdapter::new(mobile, password);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Nike { refresh_token } => {
            let mut adapter = NikeAdapter::new(refresh_token);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Runtastic { email, password } => {
            let mut adapter = RuntasticAdapter::new(email, password);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Gpx(args) => {
            let dir = args.dir.unwrap_or_else(|| ctx.config.download_dir("gpx"));
            let mut adapter = FileAdapter::new(dir, TrackFormat::Gpx);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Tcx(args) => {
            let dir = args.dir.unwrap_or_else(|| ctx.config.download_dir("tcx"));
            let mut adapter = FileAdapter::new(dir, TrackFormat::Tcx);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Fit(args) => {
            let dir = args.dir.unwrap_or_else(|| ctx.config.download_dir("fit"));
            let mut adapter = FileAdapter::new(dir, TrackFormat::Fit);
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::Kml {
            path,
            name,
            start_date,
            end_date,
            hours_per_day,
            distance_km,
            is_cn,
        } => {
            let mut adapter = RoadTripAdapter {
                kml_path: path,
                name,
                start_date,
                end_date,
                hours_per_day,
                distance_km,
                is_gcj02: is_cn,
            };
            sync::run_adapter(&mut ctx, &mut adapter).await?
        }
        Command::StravaUpload { credentials, files } => {
            upload_to_strava(&mut ctx, credentials, files).await?
        }
    };

    tracing::info!(
        stored,
        total = ctx.store.count()?,
        "Done"
    );
    Ok(())
}

/// Upload each file to Strava, skipping unsupported extensions.
async fn upload_to_strava(
    ctx: &mut AppContext,
    credentials: StravaArgs,
    files: Vec<PathBuf>,
) -> Result<usize> {
    let client = StravaClient::new(
        credentials.client_id,
        credentials.client_secret,
        credentials.refresh_token,
    );
    let access_token = client.authenticate().await?;

    let mut uploaded = 0usize;
    for path in files {
        let data_type = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ["gpx", "tcx", "fit"].contains(&ext.to_lowercase().as_str()) => {
                ext.to_lowercase()
            }
            _ => {
                tracing::warn!(file = %path.display(), "Unsupported upload format, skipping");
                continue;
            }
        };
        match client
            .upload(&access_token, &mut ctx.limiter, &path, &data_type)
            .await
        {
            Ok(activity_id) => {
                tracing::info!(file = %path.display(), activity_id, "Uploaded");
                uploaded += 1;
            }
            Err(e @ AppError::UploadFailed { .. }) => {
                tracing::error!(file = %path.display(), error = %e, "Upload rejected, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(uploaded)
}

/// Initialize compact terminal logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("runsync=info".parse().expect("static directive"))
                .add_directive("warn".parse().expect("static directive")),
        )
        .with(format)
        .init();
}
