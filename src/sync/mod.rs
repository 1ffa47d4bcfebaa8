// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestration: the adapter seam and the shared run loop.
//!
//! Every source (provider API or local folder) implements [`Adapter`]; the
//! runner resolves the incremental cursor, drives the adapter, flushes the
//! synced-file log, and projects the catalog when anything changed.

pub mod files;
pub mod kml_trip;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog;
use crate::error::Result;
use crate::AppContext;

/// One activity source. Implementations fetch whatever is new since the
/// cursor, normalize it, and hand each record to
/// [`AppContext::finish_activity`].
#[async_trait]
pub trait Adapter {
    /// Stable identifier stored in each record's `source` column.
    fn source(&self) -> &'static str;

    /// Ingest everything newer than `since`, returning how many activities
    /// were stored.
    async fn sync(&mut self, ctx: &mut AppContext, since: Option<DateTime<Utc>>) -> Result<usize>;
}

/// Drive one adapter end to end: cursor, sync, log flush, catalog projection.
pub async fn run_adapter(ctx: &mut AppContext, adapter: &mut dyn Adapter) -> Result<usize> {
    let source = adapter.source();
    let since = ctx.cursor(source)?;
    tracing::info!(
        source,
        since = since.map(|t| t.to_rfc3339()).as_deref().unwrap_or("beginning"),
        "Starting sync"
    );

    let stored = adapter.sync(ctx, since).await;

    // Flush whatever was recorded before propagating an adapter failure, so
    // a partial run is not re-done from scratch.
    ctx.sync_log.save()?;

    let stored = stored?;
    tracing::info!(source, stored, "Sync finished");

    if stored > 0 {
        catalog::project(&ctx.store, &ctx.config.catalog_path)?;
    }
    Ok(stored)
}
