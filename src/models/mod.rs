// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models shared across adapters, storage, and the catalog.

pub mod activity;

pub use activity::{Activity, ActivityType, TrackPoint};
