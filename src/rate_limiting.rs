// ABOUTME: Fixed-window per-source-address rate limiting for the proxy surface
// ABOUTME: 120 requests per 60 seconds by default; counters live in a concurrent map
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Rate Limiting
//!
//! A fixed 60-second window per source address. The window state is kept in
//! a concurrent map; stale windows are reset in place on the next request
//! from that address, so no background cleanup is required for correctness.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default request budget per window
pub const DEFAULT_LIMIT: u32 = 120;

/// Window length
pub const WINDOW_SECS: u64 = 60;

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether this request exceeded the budget
    pub limited: bool,
    /// Requests remaining in the current window
    pub remaining: u32,
    /// Configured budget
    pub limit: u32,
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window limiter keyed by source address
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, Duration::from_secs(WINDOW_SECS))
    }
}

impl RateLimiter {
    /// Create a limiter with a custom budget and window
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    /// Count one request from `source` and report the window status
    pub fn check(&self, source: &str) -> RateLimitStatus {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(source.to_owned())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;

        let limited = entry.count > self.limit;
        RateLimitStatus {
            limited,
            remaining: self.limit.saturating_sub(entry.count),
            limit: self.limit,
        }
    }

    /// Number of tracked source addresses
    #[must_use]
    pub fn tracked_sources(&self) -> usize {
        self.windows.len()
    }
}
