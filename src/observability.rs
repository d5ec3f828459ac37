// ABOUTME: In-memory observability: request and redaction ring buffers plus atomic counters
// ABOUTME: Rings are FIFO-bounded; redaction entries also age out after fifteen minutes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Observability Ring
//!
//! Two bounded FIFO rings back the `/logs` and `/redactions` management
//! endpoints; neither is authoritative state. Hot-path counters are plain
//! atomics so proxied requests never contend on a lock for stats.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::PiiDetection;

/// Maximum entries in the request ring
pub const REQUEST_LOG_CAPACITY: usize = 500;

/// Maximum entries in the redaction ring
pub const REDACTION_LOG_CAPACITY: usize = 100;

/// Redaction entries older than this are discarded on read
pub const REDACTION_LOG_MAX_AGE_SECS: i64 = 15 * 60;

/// Preview length cap for redaction log entries
pub const PREVIEW_MAX_CHARS: usize = 500;

/// One proxied request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    /// Completion timestamp
    pub timestamp: DateTime<Utc>,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Response status code
    pub status: u16,
    /// Source address
    pub ip: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Session id when one was involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Where a redaction originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionSource {
    /// The direct `/api/v1/redact` endpoint
    Api,
    /// The OpenAI interception path
    Openai,
    /// The Anthropic interception path
    Anthropic,
}

/// One detection-producing redaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionLogEntry {
    /// Redaction timestamp
    pub timestamp: DateTime<Utc>,
    /// Originating surface
    pub source: RedactionSource,
    /// Session the tokens were stored under
    pub session_id: String,
    /// Input preview, capped at [`PREVIEW_MAX_CHARS`]
    pub input_preview: String,
    /// Redacted preview, capped at [`PREVIEW_MAX_CHARS`]
    pub redacted_preview: String,
    /// Detections from the pipeline run
    pub detections: Vec<PiiDetection>,
}

/// Truncate a preview to the cap without splitting a character
#[must_use]
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_owned();
    }
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

/// Monotonic counters for `/stats`
#[derive(Debug, Default)]
pub struct StatsCounters {
    /// Proxied + direct requests handled
    pub requests_total: AtomicU64,
    /// Redactions that produced at least one detection
    pub redactions_total: AtomicU64,
    /// Detections across all redactions
    pub detections_total: AtomicU64,
    /// Upstream requests that failed or returned non-2xx
    pub upstream_errors_total: AtomicU64,
}

impl StatsCounters {
    /// Bump a counter by one
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter
    #[must_use]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// The two rings plus counters
pub struct ObservabilityRing {
    requests: Mutex<VecDeque<RequestLogEntry>>,
    redactions: Mutex<VecDeque<RedactionLogEntry>>,
    /// Hot-path counters
    pub stats: StatsCounters,
    started_at: DateTime<Utc>,
}

impl Default for ObservabilityRing {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservabilityRing {
    /// Create empty rings
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(VecDeque::with_capacity(REQUEST_LOG_CAPACITY)),
            redactions: Mutex::new(VecDeque::with_capacity(REDACTION_LOG_CAPACITY)),
            stats: StatsCounters::default(),
            started_at: Utc::now(),
        }
    }

    /// Process start time
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record one proxied request, evicting FIFO at capacity
    pub fn record_request(&self, entry: RequestLogEntry) {
        StatsCounters::incr(&self.stats.requests_total);
        if let Ok(mut ring) = self.requests.lock() {
            if ring.len() == REQUEST_LOG_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(entry);
        }
    }

    /// Record one detection-producing redaction
    pub fn record_redaction(&self, entry: RedactionLogEntry) {
        StatsCounters::incr(&self.stats.redactions_total);
        self.stats
            .detections_total
            .fetch_add(entry.detections.len() as u64, Ordering::Relaxed);
        if let Ok(mut ring) = self.redactions.lock() {
            if ring.len() == REDACTION_LOG_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(entry);
        }
    }

    /// Snapshot the request ring, newest last
    #[must_use]
    pub fn requests(&self) -> Vec<RequestLogEntry> {
        self.requests
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot the redaction ring, discarding entries older than 15 minutes
    #[must_use]
    pub fn redactions(&self) -> Vec<RedactionLogEntry> {
        let cutoff = Utc::now() - chrono::Duration::seconds(REDACTION_LOG_MAX_AGE_SECS);
        self.redactions
            .lock()
            .map(|mut ring| {
                while ring.front().is_some_and(|e| e.timestamp < cutoff) {
                    ring.pop_front();
                }
                ring.iter().cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Drop every request entry
    pub fn clear_requests(&self) {
        if let Ok(mut ring) = self.requests.lock() {
            ring.clear();
        }
    }

    /// Drop every redaction entry
    pub fn clear_redactions(&self) {
        if let Ok(mut ring) = self.redactions.lock() {
            ring.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> RequestLogEntry {
        RequestLogEntry {
            timestamp: Utc::now(),
            method: "POST".to_owned(),
            path: path.to_owned(),
            status: 200,
            ip: "127.0.0.1".to_owned(),
            duration_ms: 12,
            session_id: None,
        }
    }

    fn redaction(at: DateTime<Utc>) -> RedactionLogEntry {
        RedactionLogEntry {
            timestamp: at,
            source: RedactionSource::Api,
            session_id: "s".to_owned(),
            input_preview: "in".to_owned(),
            redacted_preview: "out".to_owned(),
            detections: Vec::new(),
        }
    }

    #[test]
    fn request_ring_evicts_fifo() {
        let ring = ObservabilityRing::new();
        for i in 0..(REQUEST_LOG_CAPACITY + 10) {
            ring.record_request(request(&format!("/r/{i}")));
        }
        let entries = ring.requests();
        assert_eq!(entries.len(), REQUEST_LOG_CAPACITY);
        assert_eq!(entries[0].path, "/r/10");
    }

    #[test]
    fn redaction_ring_ages_out() {
        let ring = ObservabilityRing::new();
        ring.record_redaction(redaction(Utc::now() - chrono::Duration::minutes(20)));
        ring.record_redaction(redaction(Utc::now()));
        let entries = ring.redactions();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn preview_caps_length() {
        let long = "x".repeat(2000);
        assert_eq!(preview(&long).chars().count(), PREVIEW_MAX_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn counters_track_redactions() {
        let ring = ObservabilityRing::new();
        let mut entry = redaction(Utc::now());
        entry.detections.push(crate::models::PiiDetection {
            layer: crate::models::RedactionLayer::Regex,
            category: "EMAIL".to_owned(),
            value: "a@b.co".to_owned(),
            start_index: 0,
            end_index: 6,
            confidence: 0.95,
        });
        ring.record_redaction(entry);
        assert_eq!(StatsCounters::get(&ring.stats.redactions_total), 1);
        assert_eq!(StatsCounters::get(&ring.stats.detections_total), 1);
    }
}
