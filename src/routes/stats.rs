// ABOUTME: Stats and storage report endpoints with tiered token access
// ABOUTME: Full stats accept API_TOKEN or STATS_TOKEN; the public subset needs no auth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Stats API

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppResult;
use crate::middleware::auth::require_any_token;
use crate::observability::StatsCounters;
use crate::routes::ServerResources;

/// Full stats payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Seconds since process start
    pub uptime_secs: i64,
    /// Requests handled
    pub requests_total: u64,
    /// Detection-producing redactions
    pub redactions_total: u64,
    /// Detections across all redactions
    pub detections_total: u64,
    /// Upstream failures and non-2xx statuses
    pub upstream_errors_total: u64,
    /// Stored sessions
    pub sessions: i64,
    /// Enabled dictionary terms
    pub dictionary_terms: usize,
    /// Live in-memory session maps
    pub active_session_maps: usize,
}

/// Limited unauthenticated stats payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsResponse {
    /// Seconds since process start
    pub uptime_secs: i64,
    /// Requests handled
    pub requests_total: u64,
    /// Detection-producing redactions
    pub redactions_total: u64,
}

/// Storage report payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResponse {
    /// Durable store path
    pub path: String,
    /// Database file size in bytes, when resolvable
    pub size_bytes: Option<u64>,
    /// Session rows
    pub sessions: i64,
    /// Dictionary rows
    pub dictionary_entries: i64,
    /// Settings rows
    pub settings: i64,
}

/// Stats routes handler
pub struct StatsRoutes;

impl StatsRoutes {
    /// Create all stats routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/stats", get(Self::stats))
            .route("/api/v1/stats/public", get(Self::public_stats))
            .route("/api/v1/storage", get(Self::storage))
            .with_state(resources)
    }

    /// Stats endpoints accept the API token or the read-only stats token
    fn guard(resources: &ServerResources, headers: &HeaderMap) -> AppResult<()> {
        let mut accepted: Vec<&str> = Vec::new();
        if let Some(token) = resources.config.api_token.as_deref() {
            accepted.push(token);
        }
        if let Some(token) = resources.config.stats_token.as_deref() {
            accepted.push(token);
        }
        if accepted.is_empty() {
            return Ok(());
        }
        require_any_token(headers, &accepted)
    }

    fn uptime_secs(resources: &ServerResources) -> i64 {
        (Utc::now() - resources.observability.started_at()).num_seconds()
    }

    async fn stats(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<StatsResponse>> {
        Self::guard(&resources, &headers)?;
        let stats = &resources.observability.stats;
        Ok(Json(StatsResponse {
            uptime_secs: Self::uptime_secs(&resources),
            requests_total: StatsCounters::get(&stats.requests_total),
            redactions_total: StatsCounters::get(&stats.redactions_total),
            detections_total: StatsCounters::get(&stats.detections_total),
            upstream_errors_total: StatsCounters::get(&stats.upstream_errors_total),
            sessions: resources.rehydration.size().await?,
            dictionary_terms: resources.dictionary.term_count(),
            active_session_maps: resources.session_maps.session_count(),
        }))
    }

    async fn public_stats(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<PublicStatsResponse> {
        let stats = &resources.observability.stats;
        Json(PublicStatsResponse {
            uptime_secs: Self::uptime_secs(&resources),
            requests_total: StatsCounters::get(&stats.requests_total),
            redactions_total: StatsCounters::get(&stats.redactions_total),
        })
    }

    async fn storage(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<StorageResponse>> {
        Self::guard(&resources, &headers)?;
        let (sessions, dictionary_entries, settings) = resources.database.table_counts().await?;
        let size_bytes = tokio::fs::metadata(&resources.config.db_path)
            .await
            .ok()
            .map(|m| m.len());
        Ok(Json(StorageResponse {
            path: resources.config.db_path.clone(),
            size_bytes,
            sessions,
            dictionary_entries,
            settings,
        }))
    }
}
