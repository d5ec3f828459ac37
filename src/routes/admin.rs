// ABOUTME: Unauthenticated token verification endpoint used by the admin UI
// ABOUTME: Compares the candidate token in constant time and reports validity only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Admin verification API

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::middleware::auth::tokens_match;
use crate::routes::ServerResources;

/// Verification request body
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Candidate token
    pub token: String,
}

/// Verification outcome
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Whether the token matches the configured API token
    pub valid: bool,
}

/// Admin routes handler
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create the admin verification route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/admin/verify", post(Self::verify))
            .with_state(resources)
    }

    async fn verify(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<VerifyRequest>,
    ) -> Json<VerifyResponse> {
        let valid = resources
            .config
            .api_token
            .as_deref()
            .is_some_and(|expected| tokens_match(&request.token, expected));
        Json(VerifyResponse { valid })
    }
}
