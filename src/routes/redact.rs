// ABOUTME: Direct redaction endpoint exposing the pipeline over HTTP
// ABOUTME: Accepts text with an optional locale override, returns detections and redacted text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Direct redaction API
//!
//! `POST /api/v1/redact` runs the full pipeline on the supplied text and
//! stores the minted bindings under the caller's session, exactly like the
//! interception path. A request-level `locale` overrides the stored setting
//! for that call only.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::middleware::auth::require_token;
use crate::models::{Locale, PiiDetection};
use crate::observability::{preview, RedactionLogEntry, RedactionSource};
use crate::rehydration::DEFAULT_TTL_SECS;
use crate::routes::proxy::{client_ip, log_request, resolve_session_id};
use crate::routes::{ServerResources, MAX_REDACT_CHARS};

/// Request body for direct redaction
#[derive(Debug, Deserialize)]
pub struct RedactRequest {
    /// Text to redact (at most 100,000 characters)
    pub text: String,
    /// Optional locale override for this call
    #[serde(default)]
    pub locale: Option<String>,
}

/// Response body for direct redaction
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactResponse {
    /// Rewritten text
    pub redacted_text: String,
    /// Session the bindings were stored under
    pub session_id: String,
    /// All detections from the run
    pub detections: Vec<PiiDetection>,
}

/// Direct redaction routes handler
pub struct RedactRoutes;

impl RedactRoutes {
    /// Create the redaction route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/redact", post(Self::redact))
            .with_state(resources)
    }

    async fn redact(
        State(resources): State<Arc<ServerResources>>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        Json(request): Json<RedactRequest>,
    ) -> AppResult<Json<RedactResponse>> {
        let started = Instant::now();
        let ip = client_ip(&headers, addr);

        if let Some(token) = resources.config.api_token.as_deref() {
            require_token(&headers, token)?;
        }

        if request.text.chars().count() > MAX_REDACT_CHARS {
            return Err(AppError::invalid_input(format!(
                "text exceeds maximum length of {MAX_REDACT_CHARS} characters"
            )));
        }
        // Locale strings outside {AU,NZ,UK,US} are invalid rather than silently
        // universal
        let locale_override = match request.locale.as_deref() {
            None => None,
            Some(raw) => Some(Locale::parse(raw).ok_or_else(|| {
                AppError::invalid_input(format!("unknown locale: {raw}"))
            })?),
        };

        let session_id = resolve_session_id(&headers);
        let mut settings = resources.settings.snapshot().await?;
        if locale_override.is_some() {
            settings.locale = locale_override;
        }

        let outcome = resources.pipeline.redact(&request.text, &settings).await;

        let mut redacted_text = outcome.redacted_text;
        if !outcome.tokens.is_empty() {
            let stored = resources
                .rehydration
                .store(&session_id, outcome.tokens.clone(), DEFAULT_TTL_SECS)
                .await?;
            // A repeated original re-minted by the pipeline must leave with
            // the placeholder the session already binds
            redacted_text = stored.rewrite(&redacted_text);
            resources.session_maps.insert(
                &session_id,
                outcome
                    .tokens
                    .iter()
                    .filter(|t| !stored.aliases.contains_key(&t.placeholder))
                    .map(|t| (t.placeholder.clone(), t.original.clone())),
            );
        }

        if !outcome.detections.is_empty() {
            resources.observability.record_redaction(RedactionLogEntry {
                timestamp: Utc::now(),
                source: RedactionSource::Api,
                session_id: session_id.clone(),
                input_preview: preview(&request.text),
                redacted_preview: preview(&redacted_text),
                detections: outcome.detections.clone(),
            });
        }

        log_request(
            &resources,
            "POST",
            "/api/v1/redact",
            200,
            &ip,
            started,
            Some(&session_id),
        );

        Ok(Json(RedactResponse {
            redacted_text,
            session_id,
            detections: outcome.detections,
        }))
    }
}
