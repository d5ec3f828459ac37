// ABOUTME: Management endpoints for the request and redaction ring buffers
// ABOUTME: Read returns a snapshot; delete clears the ring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Observability ring API

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};

use crate::errors::AppResult;
use crate::middleware::auth::require_token;
use crate::observability::{RedactionLogEntry, RequestLogEntry};
use crate::routes::ServerResources;

/// Log routes handler
pub struct LogRoutes;

impl LogRoutes {
    /// Create all log routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/logs", get(Self::requests).delete(Self::clear_requests))
            .route(
                "/api/v1/redactions",
                get(Self::redactions).delete(Self::clear_redactions),
            )
            .with_state(resources)
    }

    fn guard(resources: &ServerResources, headers: &HeaderMap) -> AppResult<()> {
        if let Some(token) = resources.config.api_token.as_deref() {
            require_token(headers, token)?;
        }
        Ok(())
    }

    async fn requests(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<Vec<RequestLogEntry>>> {
        Self::guard(&resources, &headers)?;
        Ok(Json(resources.observability.requests()))
    }

    async fn clear_requests(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<serde_json::Value>> {
        Self::guard(&resources, &headers)?;
        resources.observability.clear_requests();
        Ok(Json(serde_json::json!({"cleared": true})))
    }

    async fn redactions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<Vec<RedactionLogEntry>>> {
        Self::guard(&resources, &headers)?;
        Ok(Json(resources.observability.redactions()))
    }

    async fn clear_redactions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<serde_json::Value>> {
        Self::guard(&resources, &headers)?;
        resources.observability.clear_redactions();
        Ok(Json(serde_json::json!({"cleared": true})))
    }
}
