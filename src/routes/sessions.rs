// ABOUTME: Management endpoints for rehydration sessions
// ABOUTME: Listing masks originals; the hydrate endpoint alone exposes real values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Session management API
//!
//! All listing and get responses replace each binding's `original` with
//! `[REDACTED]`; only `POST /sessions/:id/hydrate` substitutes the real
//! values back into caller-supplied text.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::middleware::auth::require_token;
use crate::models::{RedactionLayer, Session, TokenBinding};
use crate::rehydration::DEFAULT_TTL_SECS;
use crate::routes::ServerResources;

/// Mask shown in place of original values
const MASK: &str = "[REDACTED]";

/// Search query parameters
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive needle over originals, categories and metadata
    pub q: String,
}

/// Hydrate request body
#[derive(Debug, Deserialize)]
pub struct HydrateRequest {
    /// Text containing placeholders to resolve
    pub text: String,
}

/// Hydrate response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrateResponse {
    /// Text with originals restored
    pub hydrated_text: String,
}

/// Extend request body
#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    /// New TTL in seconds from now
    pub ttl: i64,
}

/// Manual token seeding request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTokensRequest {
    /// `placeholder -> original` pairs to bind
    pub tokens: HashMap<String, String>,
    /// Layer tag recorded on the bindings
    #[serde(rename = "type")]
    pub layer: RedactionLayer,
    /// Category tag recorded on the bindings
    pub category: String,
    /// Optional TTL override
    #[serde(default)]
    pub ttl: Option<i64>,
    /// Optional metadata attached to every binding
    #[serde(default)]
    pub meta: Option<HashMap<String, String>>,
}

/// Deletion outcome
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// Whether the session existed
    pub deleted: bool,
}

/// Bulk deletion outcome
#[derive(Debug, Serialize)]
pub struct DeletedCountResponse {
    /// Sessions removed
    pub deleted: u64,
}

fn masked(mut session: Session) -> Session {
    for token in &mut session.tokens {
        token.original = MASK.to_owned();
    }
    session
}

/// Session routes handler
pub struct SessionRoutes;

impl SessionRoutes {
    /// Create all session routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/sessions", get(Self::list))
            .route("/api/v1/sessions", delete(Self::delete_all))
            .route("/api/v1/sessions/search", get(Self::search))
            .route("/api/v1/sessions/:id", get(Self::get_one))
            .route("/api/v1/sessions/:id", delete(Self::delete_one))
            .route("/api/v1/sessions/:id/hydrate", post(Self::hydrate))
            .route("/api/v1/sessions/:id/extend", post(Self::extend))
            .route("/api/v1/sessions/:id/tokens", post(Self::add_tokens))
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
    ) -> AppResult<Json<Vec<Session>>> {
        Self::guard(&resources, &headers)?;
        let sessions = resources.rehydration.get_all().await?;
        Ok(Json(sessions.into_iter().map(masked).collect()))
    }

    async fn search(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<SearchQuery>,
    ) -> AppResult<Json<Vec<Session>>> {
        Self::guard(&resources, &headers)?;
        let sessions = resources.rehydration.search(&query.q).await?;
        Ok(Json(sessions.into_iter().map(masked).collect()))
    }

    async fn get_one(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> AppResult<Json<Session>> {
        Self::guard(&resources, &headers)?;
        let session = resources
            .rehydration
            .retrieve(&id)
            .await?
            .ok_or_else(|| AppError::not_found("session"))?;
        Ok(Json(masked(session)))
    }

    async fn delete_one(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> AppResult<Json<DeletedResponse>> {
        Self::guard(&resources, &headers)?;
        let deleted = resources.rehydration.delete(&id).await?;
        resources.session_maps.remove(&id);
        Ok(Json(DeletedResponse { deleted }))
    }

    async fn delete_all(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<DeletedCountResponse>> {
        Self::guard(&resources, &headers)?;
        let deleted = resources.rehydration.delete_all().await?;
        Ok(Json(DeletedCountResponse { deleted }))
    }

    async fn hydrate(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(request): Json<HydrateRequest>,
    ) -> AppResult<Json<HydrateResponse>> {
        Self::guard(&resources, &headers)?;
        let hydrated_text = resources.rehydration.hydrate(&request.text, &id).await?;
        Ok(Json(HydrateResponse { hydrated_text }))
    }

    async fn extend(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(request): Json<ExtendRequest>,
    ) -> AppResult<Json<Session>> {
        Self::guard(&resources, &headers)?;
        if !resources.rehydration.extend(&id, request.ttl).await? {
            return Err(AppError::not_found("session"));
        }
        let session = resources
            .rehydration
            .retrieve(&id)
            .await?
            .ok_or_else(|| AppError::not_found("session"))?;
        Ok(Json(masked(session)))
    }

    async fn add_tokens(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(request): Json<AddTokensRequest>,
    ) -> AppResult<Json<Session>> {
        Self::guard(&resources, &headers)?;

        let bindings: Vec<TokenBinding> = request
            .tokens
            .into_iter()
            .map(|(placeholder, original)| TokenBinding {
                placeholder,
                original,
                layer: request.layer,
                category: request.category.clone(),
                meta: request.meta.clone(),
            })
            .collect();
        if bindings.is_empty() {
            return Err(AppError::invalid_input("tokens must not be empty"));
        }

        let ttl = request.ttl.unwrap_or(DEFAULT_TTL_SECS);
        let stored = resources.rehydration.store(&id, bindings.clone(), ttl).await?;
        resources.session_maps.insert(
            &id,
            bindings
                .iter()
                .filter(|t| !stored.aliases.contains_key(&t.placeholder))
                .map(|t| (t.placeholder.clone(), t.original.clone())),
        );
        Ok(Json(masked(stored.session)))
    }
}
