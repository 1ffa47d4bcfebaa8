// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider API clients and shared HTTP/rate-limit plumbing.

pub mod garmin;
pub mod http;
pub mod keep;
pub mod nike;
pub mod rate_limit;
pub mod runtastic;
pub mod strava;
