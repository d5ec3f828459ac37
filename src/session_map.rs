// ABOUTME: Bounded in-memory per-session placeholder maps used by the streaming hydrator
// ABOUTME: LRU-capped at 10k bindings per session with idle TTL and periodic sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # In-memory Session Maps
//!
//! The interception path keeps each session's `placeholder -> original`
//! bindings in memory so response hydration never waits on storage. Maps are
//! bounded (LRU, 10,000 entries per session) and idle-expired after one
//! hour; a 5-minute sweeper evicts stale sessions. Hydration snapshots a
//! session's bindings before the upstream response starts, so bindings added
//! by concurrent requests never affect an in-flight stream.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use tokio::task::JoinHandle;

/// Maximum bindings kept in memory per session
pub const MAX_TOKENS_PER_SESSION: usize = 10_000;

/// Idle lifetime of an in-memory session map
pub const IDLE_TTL_SECS: u64 = 3600;

/// Sweeper cadence for idle maps
pub const SWEEP_INTERVAL_SECS: u64 = 300;

struct SessionEntry {
    map: LruCache<String, String>,
    last_used: Instant,
}

/// Process-wide registry of per-session binding maps
pub struct SessionTokenMap {
    sessions: DashMap<String, SessionEntry>,
}

impl Default for SessionTokenMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTokenMap {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    fn capacity() -> NonZeroUsize {
        NonZeroUsize::new(MAX_TOKENS_PER_SESSION).unwrap_or(NonZeroUsize::MIN)
    }

    /// Record bindings for a session, refreshing its idle timer
    pub fn insert(&self, session_id: &str, bindings: impl IntoIterator<Item = (String, String)>) {
        let mut entry = self
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionEntry {
                map: LruCache::new(Self::capacity()),
                last_used: Instant::now(),
            });
        entry.last_used = Instant::now();
        for (placeholder, original) in bindings {
            entry.map.put(placeholder, original);
        }
    }

    /// Snapshot a session's bindings as (placeholder, original) pairs.
    ///
    /// The returned vector is detached from the live map: concurrent inserts
    /// do not affect hydration performed over the snapshot.
    #[must_use]
    pub fn snapshot(&self, session_id: &str) -> Vec<(String, String)> {
        self.sessions
            .get_mut(session_id)
            .map(|mut entry| {
                entry.last_used = Instant::now();
                entry
                    .map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of bindings held for a session
    #[must_use]
    pub fn len(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map_or(0, |entry| entry.map.len())
    }

    /// Whether no sessions are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of live session maps
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop one session's map
    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Evict sessions idle longer than the TTL; returns evicted count
    pub fn sweep(&self, idle_ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_used.elapsed() < idle_ttl);
        before - self.sessions.len()
    }

    /// Spawn the 5-minute idle sweeper. Abort the handle on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let maps = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = maps.sweep(Duration::from_secs(IDLE_TTL_SECS));
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted idle session maps");
                }
            }
        })
    }
}

/// Substitute every snapshot placeholder occurring in `text` with its original
#[must_use]
pub fn substitute(text: &str, snapshot: &[(String, String)]) -> String {
    let mut result = text.to_owned();
    for (placeholder, original) in snapshot {
        if result.contains(placeholder.as_str()) {
            result = result.replace(placeholder.as_str(), original);
        }
    }
    result
}
