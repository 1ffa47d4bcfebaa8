// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dual-window rate limiter for the Strava-like API.
//!
//! Strava enforces two budgets at once: a short window (100 requests per
//! 15 minutes) and a long window (1000 per day). Every outbound request
//! consumes one token from each. Server `X-RateLimit-Usage` /
//! `X-RateLimit-Limit` headers reconcile the local counters to the
//! authoritative values, since other clients may share the quota.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};

/// One rule: a budget over a sliding window.
#[derive(Debug)]
pub struct RateLimitRule {
    limit: u32,
    window: Duration,
    usage: u32,
    window_start: Instant,
    last_exceeded: Option<Instant>,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            usage: 0,
            window_start: Instant::now(),
            last_exceeded: None,
        }
    }

    /// Roll the window forward if it has elapsed.
    fn refresh(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window {
            self.usage = 0;
            self.window_start = now;
            self.last_exceeded = None;
        }
    }

    /// Time until this rule frees up, zero if it already has.
    fn retry_after(&self, now: Instant) -> Duration {
        self.window
            .saturating_sub(now.duration_since(self.window_start))
    }

    fn exhausted(&self) -> bool {
        self.usage >= self.limit
    }
}

/// Dual-window limiter guarding outbound HTTP.
#[derive(Debug)]
pub struct RateLimiter {
    rules: Vec<RateLimitRule>,
    /// Fail fast with `RateLimitTimeout` instead of sleeping in place.
    fail_fast: bool,
}

impl RateLimiter {
    /// Production Strava budgets: 100/15 min and 1000/day.
    pub fn strava_default(fail_fast: bool) -> Self {
        Self::new(
            vec![
                RateLimitRule::new(100, Duration::from_secs(15 * 60)),
                RateLimitRule::new(1000, Duration::from_secs(24 * 60 * 60)),
            ],
            fail_fast,
        )
    }

    /// A limiter that never blocks, for adapters with no HTTP quota.
    pub fn unlimited() -> Self {
        Self::new(Vec::new(), false)
    }

    pub fn new(rules: Vec<RateLimitRule>, fail_fast: bool) -> Self {
        Self { rules, fail_fast }
    }

    /// Consume one token from every rule, waiting (or failing fast) when a
    /// budget is exhausted.
    pub async fn acquire(&mut self) -> Result<()> {
        loop {
            let now = Instant::now();
            for rule in &mut self.rules {
                rule.refresh(now);
            }

            match self.rules.iter().find(|r| r.exhausted()) {
                None => break,
                Some(rule) => {
                    let retry_after = rule.retry_after(now);
                    if self.fail_fast {
                        return Err(AppError::RateLimitTimeout { retry_after });
                    }
                    tracing::warn!(
                        retry_after_secs = retry_after.as_secs(),
                        "Rate limit budget exhausted, waiting"
                    );
                    tokio::time::sleep(retry_after).await;
                }
            }
        }

        for rule in &mut self.rules {
            rule.usage += 1;
        }
        Ok(())
    }

    /// Reconcile local counters with server-reported usage headers.
    ///
    /// Strava reports both windows comma-separated: `"87,543"`.
    pub fn reconcile(&mut self, usage_header: &str, limit_header: &str) {
        let usages = parse_counts(usage_header);
        let limits = parse_counts(limit_header);
        for (i, rule) in self.rules.iter_mut().enumerate() {
            if let Some(&usage) = usages.get(i) {
                rule.usage = usage;
            }
            if let Some(&limit) = limits.get(i) {
                rule.limit = limit;
            }
        }
    }

    /// Record a server-side 429: mark every exhausted-or-full rule.
    pub fn note_exceeded(&mut self) {
        let now = Instant::now();
        for rule in &mut self.rules {
            rule.usage = rule.usage.max(rule.limit);
            rule.last_exceeded = Some(now);
        }
    }
}

fn parse_counts(header: &str) -> Vec<u32> {
    header
        .split(',')
        .filter_map(|v| v.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limiter(limit: u32, window_secs: u64, fail_fast: bool) -> RateLimiter {
        RateLimiter::new(
            vec![RateLimitRule::new(limit, Duration::from_secs(window_secs))],
            fail_fast,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_and_recovery() {
        let mut limiter = test_limiter(10, 5, true);

        for _ in 0..10 {
            limiter.acquire().await.expect("within budget");
        }

        // 11th request fails fast with a bounded retry hint
        let err = limiter.acquire().await.unwrap_err();
        let retry_after = match err {
            AppError::RateLimitTimeout { retry_after } => retry_after,
            other => panic!("unexpected error: {:?}", other),
        };
        assert!(retry_after > Duration::ZERO && retry_after <= Duration::from_secs(5));

        // After sleeping out the hint the next request succeeds
        tokio::time::sleep(retry_after).await;
        limiter.acquire().await.expect("window rolled over");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_mode_waits_instead_of_failing() {
        let mut limiter = test_limiter(2, 5, false);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        // Paused tokio time auto-advances: this waits "5 seconds" logically
        let before = Instant::now();
        limiter.acquire().await.unwrap();
        assert!(Instant::now().duration_since(before) >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_adopts_server_counters() {
        let mut limiter = RateLimiter::strava_default(true);
        limiter.reconcile("99,500", "100,1000");
        limiter.acquire().await.expect("one token left in short window");
        assert!(limiter.acquire().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_note_exceeded_blocks_until_window_rolls() {
        let mut limiter = test_limiter(10, 5, true);
        limiter.acquire().await.unwrap();
        limiter.note_exceeded();
        assert!(limiter.acquire().await.is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        limiter.acquire().await.expect("window reset");
    }

    #[test]
    fn test_parse_counts() {
        assert_eq!(parse_counts("87,543"), vec![87, 543]);
        assert_eq!(parse_counts(" 1 , 2 "), vec![1, 2]);
        assert_eq!(parse_counts("garbage"), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn test_unlimited_never_blocks() {
        let mut limiter = RateLimiter::unlimited();
        for _ in 0..10_000 {
            limiter.acquire().await.unwrap();
        }
    }
}
