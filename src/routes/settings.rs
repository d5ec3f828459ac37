// ABOUTME: Management endpoints for the live settings store
// ABOUTME: Partial PUT semantics; a nerModel change resets the NER pipeline handle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Settings management API

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::middleware::auth::require_token;
use crate::routes::ServerResources;

/// One setting in a get-by-key response
#[derive(Debug, Serialize)]
pub struct SettingResponse {
    /// Setting key
    pub key: String,
    /// Effective value
    pub value: Value,
}

/// Update outcome
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    /// Keys that changed
    pub updated: Vec<String>,
}

/// Settings routes handler
pub struct SettingsRoutes;

impl SettingsRoutes {
    /// Create all settings routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/settings", get(Self::list).put(Self::update))
            .route("/api/v1/settings/:key", get(Self::get_one))
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
    ) -> AppResult<Json<BTreeMap<String, Value>>> {
        Self::guard(&resources, &headers)?;
        Ok(Json(resources.settings.all().await?))
    }

    async fn get_one(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(key): Path<String>,
    ) -> AppResult<Json<SettingResponse>> {
        Self::guard(&resources, &headers)?;
        let value = resources
            .settings
            .get(&key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("setting '{key}'")))?;
        Ok(Json(SettingResponse { key, value }))
    }

    async fn update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(changes): Json<BTreeMap<String, Value>>,
    ) -> AppResult<Json<UpdateResponse>> {
        Self::guard(&resources, &headers)?;
        if changes.is_empty() {
            return Err(AppError::invalid_input("no settings provided"));
        }

        let model_changed = changes.contains_key("nerModel");
        let updated = resources.settings.update(&changes).await?;

        if model_changed {
            resources.ner.reset().await;
            tracing::info!("nerModel changed, NER pipeline reset");
        }

        Ok(Json(UpdateResponse { updated }))
    }
}
