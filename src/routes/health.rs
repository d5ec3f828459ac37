// ABOUTME: Health check endpoint for load balancers and container orchestration
// ABOUTME: Unauthenticated; reports process liveness only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Health check route

use axum::routing::get;
use axum::{Json, Router};

/// Build the health router
pub fn routes() -> Router {
    Router::new().route("/health", get(handle_health))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
