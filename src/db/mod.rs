// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local persistence: the SQLite activity store and the synced-file log.

pub mod store;
pub mod sync_log;

pub use store::{ActivityFilter, Store};
pub use sync_log::SyncedFileLog;
