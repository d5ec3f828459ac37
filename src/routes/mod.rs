// ABOUTME: Route registration and the shared ServerResources dependency container
// ABOUTME: Assembles proxy, direct-redaction and management routers with common middleware
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! HTTP surface
//!
//! One router serves three surfaces: the interception proxy
//! (`/v1/chat/completions`, `/v1/messages`, passthrough), the direct
//! redaction API, and the management API under `/api/v1`. Handlers share
//! one [`ServerResources`] container.

pub mod admin;
pub mod dictionary;
pub mod health;
pub mod logs;
pub mod proxy;
pub mod redact;
pub mod sessions;
pub mod settings;
pub mod stats;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::database::Database;
use crate::layers::dictionary::DictionaryLayer;
use crate::layers::ner::NerLayer;
use crate::observability::ObservabilityRing;
use crate::pipeline::RedactionPipeline;
use crate::rate_limiting::RateLimiter;
use crate::rehydration::RehydrationStore;
use crate::session_map::SessionTokenMap;
use crate::settings::SettingsStore;
use crate::upstream::UpstreamClient;

/// Maximum request body accepted by any endpoint
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Maximum text length accepted by the direct redaction endpoint
pub const MAX_REDACT_CHARS: usize = 100_000;

/// Shared dependency container handed to every route group
pub struct ServerResources {
    /// Environment configuration
    pub config: ServerConfig,
    /// Durable store handle
    pub database: Arc<Database>,
    /// Settings store
    pub settings: SettingsStore,
    /// The four-layer redaction pipeline
    pub pipeline: RedactionPipeline,
    /// Dictionary layer (management surface mutates it directly)
    pub dictionary: Arc<DictionaryLayer>,
    /// NER layer (management surface resets it on model change)
    pub ner: Arc<NerLayer>,
    /// Durable session store
    pub rehydration: Arc<RehydrationStore>,
    /// In-memory per-session hydration maps
    pub session_maps: Arc<SessionTokenMap>,
    /// Upstream forwarding client
    pub upstream: UpstreamClient,
    /// Request/redaction rings and counters
    pub observability: Arc<ObservabilityRing>,
    /// Per-source-address limiter for the proxy surface
    pub rate_limiter: RateLimiter,
}

/// Build the complete application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    let cors = match resources.config.cors_origin.as_deref() {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(AllowOrigin::exact(value))
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!("invalid CORS_ORIGIN value, falling back to permissive");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    Router::new()
        .merge(health::routes())
        .merge(proxy::ProxyRoutes::routes(Arc::clone(&resources)))
        .merge(redact::RedactRoutes::routes(Arc::clone(&resources)))
        .merge(dictionary::DictionaryRoutes::routes(Arc::clone(&resources)))
        .merge(sessions::SessionRoutes::routes(Arc::clone(&resources)))
        .merge(settings::SettingsRoutes::routes(Arc::clone(&resources)))
        .merge(stats::StatsRoutes::routes(Arc::clone(&resources)))
        .merge(logs::LogRoutes::routes(Arc::clone(&resources)))
        .merge(admin::AdminRoutes::routes(resources))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
