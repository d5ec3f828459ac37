// ABOUTME: Management endpoints for the guaranteed-redaction dictionary
// ABOUTME: Paginated listing, batch add with conflict detection, delete by id or term, flush
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Dictionary management API

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::middleware::auth::require_token;
use crate::models::DictionaryEntry;
use crate::routes::ServerResources;

/// Maximum page size for listing
pub const MAX_PAGE_LIMIT: usize = 200;

/// Default page size
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Listing query parameters
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    /// 1-based page number
    #[serde(default)]
    pub page: Option<usize>,
    /// Page size, capped at [`MAX_PAGE_LIMIT`]
    #[serde(default)]
    pub limit: Option<usize>,
    /// Case-insensitive term substring filter
    #[serde(default)]
    pub q: Option<String>,
}

/// A new entry in an add request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    /// Term to redact
    pub term: String,
    /// Optional replacement label
    #[serde(default)]
    pub replacement: Option<String>,
    /// Case-sensitive matching
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whole-word matching
    #[serde(default)]
    pub whole_word: bool,
    /// Enabled flag (disabled entries are removed)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Add request: either one entry or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddRequest {
    /// Batch shape `{"entries": [...]}`
    Batch {
        /// Entries to add
        entries: Vec<NewEntry>,
    },
    /// A single bare entry
    Single(NewEntry),
}

/// Delete-by-id request body
#[derive(Debug, Deserialize)]
pub struct DeleteByIdRequest {
    /// Entry ids to remove
    pub ids: Vec<String>,
}

/// Delete-by-term request body
#[derive(Debug, Deserialize)]
pub struct DeleteByTermRequest {
    /// Terms to remove (case-insensitive)
    pub terms: Vec<String>,
}

/// Listing response
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Entries for the requested page
    pub entries: Vec<DictionaryEntry>,
    /// Total entries after filtering
    pub total: usize,
    /// Page served
    pub page: usize,
    /// Page size served
    pub limit: usize,
}

/// Count response for delete/flush operations
#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    /// Rows removed
    pub removed: u64,
}

/// Dictionary routes handler
pub struct DictionaryRoutes;

impl DictionaryRoutes {
    /// Create all dictionary routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/dictionary", get(Self::list))
            .route("/api/v1/dictionary", post(Self::add))
            .route("/api/v1/dictionary", delete(Self::delete_by_id))
            .route("/api/v1/dictionary/flush", post(Self::flush))
            .route("/api/v1/dictionary/by-terms", delete(Self::delete_by_terms))
            .with_state(resources)
    }

    fn guard(resources: &ServerResources, headers: &HeaderMap) -> AppResult<()> {
        if let Some(token) = resources.config.api_token.as_deref() {
            require_token(headers, token)?;
        }
        Ok(())
    }

    async fn list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListQuery>,
    ) -> AppResult<Json<ListResponse>> {
        Self::guard(&resources, &headers)?;

        let mut entries = resources.dictionary.list().await?;
        if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            entries.retain(|e| e.term.to_lowercase().contains(&needle));
        }

        let total = entries.len();
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let page = query.page.unwrap_or(1).max(1);
        let entries = entries
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(Json(ListResponse {
            entries,
            total,
            page,
            limit,
        }))
    }

    async fn add(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<AddRequest>,
    ) -> AppResult<Json<Vec<DictionaryEntry>>> {
        Self::guard(&resources, &headers)?;

        let new_entries = match request {
            AddRequest::Batch { entries } => entries,
            AddRequest::Single(entry) => vec![entry],
        };
        let entries: Vec<DictionaryEntry> = new_entries
            .into_iter()
            .map(|e| DictionaryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                term: e.term,
                replacement: e.replacement,
                case_sensitive: e.case_sensitive,
                whole_word: e.whole_word,
                enabled: e.enabled,
                created_at: Utc::now(),
            })
            .collect();

        let accepted = resources.dictionary.add(entries).await?;
        Ok(Json(accepted))
    }

    async fn delete_by_id(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<DeleteByIdRequest>,
    ) -> AppResult<Json<RemovedResponse>> {
        Self::guard(&resources, &headers)?;
        let removed = resources.dictionary.remove_by_id(&request.ids).await?;
        Ok(Json(RemovedResponse { removed }))
    }

    async fn delete_by_terms(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<DeleteByTermRequest>,
    ) -> AppResult<Json<RemovedResponse>> {
        Self::guard(&resources, &headers)?;
        let removed = resources.dictionary.remove_by_terms(&request.terms).await?;
        Ok(Json(RemovedResponse { removed }))
    }

    async fn flush(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<RemovedResponse>> {
        Self::guard(&resources, &headers)?;
        let removed = resources.dictionary.clear().await?;
        Ok(Json(RemovedResponse { removed }))
    }
}
