// ABOUTME: Interception proxy routes for OpenAI and Anthropic chat-completion APIs
// ABOUTME: Redacts outbound prompt text, forwards upstream, hydrates responses and SSE streams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Interception Proxy
//!
//! Chat-completion requests pass through the redaction pipeline field by
//! field before forwarding; the reply is hydrated from the in-memory session
//! map, event by event when the client asked for a stream. Passthrough
//! routes forward untouched. A request whose token bindings cannot be
//! persisted is failed outright: PII never goes upstream without its stored
//! mapping.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::errors::AppError;
use crate::models::{is_valid_session_id, new_session_id, PiiDetection, TokenBinding};
use crate::observability::{preview, RedactionLogEntry, RequestLogEntry, StatsCounters};
use crate::rehydration::DEFAULT_TTL_SECS;
use crate::routes::ServerResources;
use crate::upstream::body::{get_text, hydrate_value, set_text, text_field_pointers};
use crate::upstream::sse::hydrate_sse_stream;
use crate::upstream::Provider;

/// Session id request/response header
pub const SESSION_HEADER: &str = "x-anonamoose-session";

/// Redaction toggle header (default true)
pub const REDACT_HEADER: &str = "x-anonamoose-redact";

/// Hydration toggle header (default true)
pub const HYDRATE_HEADER: &str = "x-anonamoose-hydrate";

/// Proxy routes handler
pub struct ProxyRoutes;

impl ProxyRoutes {
    /// Create all proxy routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/v1/chat/completions", post(Self::openai_chat))
            .route("/chat/completions", post(Self::openai_chat))
            .route("/v1/messages", post(Self::anthropic_messages))
            .route("/messages", post(Self::anthropic_messages))
            .route("/models", any(Self::openai_passthrough))
            .route("/embeddings", any(Self::openai_passthrough))
            .route("/v1/*rest", any(Self::openai_passthrough))
            .with_state(resources)
    }

    async fn openai_chat(
        State(resources): State<Arc<ServerResources>>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        intercept(
            &resources,
            Provider::OpenAi,
            "/v1/chat/completions",
            addr,
            &headers,
            &body,
        )
        .await
    }

    async fn anthropic_messages(
        State(resources): State<Arc<ServerResources>>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        intercept(
            &resources,
            Provider::Anthropic,
            "/v1/messages",
            addr,
            &headers,
            &body,
        )
        .await
    }

    /// OpenAI passthrough without redaction (`/v1/*`, `/models`, `/embeddings`)
    async fn openai_passthrough(
        State(resources): State<Arc<ServerResources>>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        OriginalUri(uri): OriginalUri,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let started = Instant::now();
        let ip = client_ip(&headers, addr);
        let path = uri.path().to_owned();

        let limit = resources.rate_limiter.check(&ip);
        if limit.limited {
            log_request(&resources, method.as_str(), &path, 429, &ip, started, None);
            return AppError::rate_limit_exceeded(limit.limit).into_response();
        }
        if headers.get(axum::http::header::AUTHORIZATION).is_none() {
            log_request(&resources, method.as_str(), &path, 401, &ip, started, None);
            return AppError::auth_required().into_response();
        }

        let path_and_query = uri
            .path_and_query()
            .map_or_else(|| path.clone(), ToString::to_string);
        let target = if path_and_query.starts_with("/v1/") {
            path_and_query
        } else {
            format!("/v1{path_and_query}")
        };

        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);
        match resources
            .upstream
            .passthrough(
                Provider::OpenAi,
                reqwest_method,
                &target,
                &headers,
                body.to_vec(),
            )
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                log_request(&resources, method.as_str(), &path, status, &ip, started, None);
                relay_response(response, false, &[]).await
            }
            Err(e) => {
                StatsCounters::incr(&resources.observability.stats.upstream_errors_total);
                let status = e.http_status().as_u16();
                log_request(&resources, method.as_str(), &path, status, &ip, started, None);
                e.into_response()
            }
        }
    }
}

/// Resolve the client address, preferring the first `x-forwarded-for` hop
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Read a boolean toggle header, defaulting to true
pub fn flag_header(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map_or(true, |value| !value.eq_ignore_ascii_case("false"))
}

/// Resolve the session id: a valid client-supplied UUID, or a fresh one
pub fn resolve_session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| is_valid_session_id(id))
        .map_or_else(new_session_id, ToOwned::to_owned)
}

/// Record one proxied request into the ring and the log stream
pub fn log_request(
    resources: &ServerResources,
    method: &str,
    path: &str,
    status: u16,
    ip: &str,
    started: Instant,
    session_id: Option<&str>,
) {
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(method, path, status, ip, duration_ms, "request");
    resources.observability.record_request(RequestLogEntry {
        timestamp: Utc::now(),
        method: method.to_owned(),
        path: path.to_owned(),
        status,
        ip: ip.to_owned(),
        duration_ms,
        session_id: session_id.map(ToOwned::to_owned),
    });
}

/// The interception path shared by both providers
async fn intercept(
    resources: &Arc<ServerResources>,
    provider: Provider,
    upstream_path: &str,
    addr: SocketAddr,
    headers: &HeaderMap,
    body: &Bytes,
) -> Response {
    let started = Instant::now();
    let ip = client_ip(headers, addr);
    let finish = |status: u16, session: Option<&str>| {
        log_request(resources, "POST", upstream_path, status, &ip, started, session);
    };

    let limit = resources.rate_limiter.check(&ip);
    if limit.limited {
        finish(429, None);
        return AppError::rate_limit_exceeded(limit.limit).into_response();
    }
    if headers.get(axum::http::header::AUTHORIZATION).is_none() {
        finish(401, None);
        return AppError::auth_required().into_response();
    }

    let session_id = resolve_session_id(headers);
    let redact_enabled = flag_header(headers, REDACT_HEADER);
    let hydrate_enabled = flag_header(headers, HYDRATE_HEADER);

    let mut json: serde_json::Value = match serde_json::from_slice(body) {
        Ok(json) => json,
        Err(e) => {
            finish(400, Some(&session_id));
            return AppError::invalid_input(format!("malformed JSON body: {e}")).into_response();
        }
    };

    if redact_enabled {
        if let Err(response) = redact_body(resources, provider, &mut json, &session_id).await {
            finish(response.status().as_u16(), Some(&session_id));
            return response;
        }
    }

    let forwarded = match serde_json::to_vec(&json) {
        Ok(bytes) => bytes,
        Err(e) => {
            finish(500, Some(&session_id));
            return AppError::internal(format!("body serialization failed: {e}")).into_response();
        }
    };

    let response = match resources
        .upstream
        .forward(provider, upstream_path, headers, forwarded)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            StatsCounters::incr(&resources.observability.stats.upstream_errors_total);
            finish(e.http_status().as_u16(), Some(&session_id));
            return e.into_response();
        }
    };

    let status = response.status().as_u16();
    if status >= 400 {
        StatsCounters::incr(&resources.observability.stats.upstream_errors_total);
    }
    finish(status, Some(&session_id));

    let snapshot = if hydrate_enabled {
        resources.session_maps.snapshot(&session_id)
    } else {
        Vec::new()
    };
    let mut relayed = relay_response(response, hydrate_enabled, &snapshot).await;
    if let Ok(value) = session_id.parse() {
        relayed.headers_mut().insert(SESSION_HEADER, value);
    }
    relayed
}

/// Redact every text field of the request body in place; persist and cache
/// the minted bindings.
///
/// Returns the full error response on failure so the caller can bail without
/// forwarding unprotected text.
async fn redact_body(
    resources: &Arc<ServerResources>,
    provider: Provider,
    json: &mut serde_json::Value,
    session_id: &str,
) -> Result<(), Response> {
    let settings = resources
        .settings
        .snapshot()
        .await
        .map_err(|e| e.into_response())?;

    let pointers = text_field_pointers(provider, json);
    let mut tokens: Vec<TokenBinding> = Vec::new();
    let mut detections: Vec<PiiDetection> = Vec::new();
    let mut input_preview = String::new();
    let mut redacted_preview = String::new();

    for pointer in &pointers {
        let Some(text) = get_text(json, pointer).map(ToOwned::to_owned) else {
            continue;
        };
        let outcome = resources.pipeline.redact(&text, &settings).await;
        if outcome.has_detections() {
            if !input_preview.is_empty() {
                input_preview.push('\n');
                redacted_preview.push('\n');
            }
            input_preview.push_str(&text);
            redacted_preview.push_str(&outcome.redacted_text);
        }
        if outcome.redacted_text != text {
            set_text(json, pointer, outcome.redacted_text);
        }
        tokens.extend(outcome.tokens);
        detections.extend(outcome.detections);
    }

    if !tokens.is_empty() {
        let stored = resources
            .rehydration
            .store(session_id, tokens.clone(), DEFAULT_TTL_SECS)
            .await
            .map_err(|e| {
                tracing::error!("token persistence failed, refusing to forward: {e}");
                e.into_response()
            })?;
        // An original the session already binds — repeated across requests
        // or across body fields — was re-minted blind by the pipeline; swap
        // those placeholders for the canonical ones before anything leaves
        if !stored.aliases.is_empty() {
            for pointer in &pointers {
                let Some(text) = get_text(json, pointer).map(ToOwned::to_owned) else {
                    continue;
                };
                let rewritten = stored.rewrite(&text);
                if rewritten != text {
                    set_text(json, pointer, rewritten);
                }
            }
            redacted_preview = stored.rewrite(&redacted_preview);
        }
        resources.session_maps.insert(
            session_id,
            tokens
                .iter()
                .filter(|t| !stored.aliases.contains_key(&t.placeholder))
                .map(|t| (t.placeholder.clone(), t.original.clone())),
        );
    }

    if !detections.is_empty() {
        resources.observability.record_redaction(RedactionLogEntry {
            timestamp: Utc::now(),
            source: provider.redaction_source(),
            session_id: session_id.to_owned(),
            input_preview: preview(&input_preview),
            redacted_preview: preview(&redacted_preview),
            detections,
        });
    }

    Ok(())
}

/// Turn an upstream response into a client response, hydrating JSON bodies
/// and SSE streams when enabled.
async fn relay_response(
    response: reqwest::Response,
    hydrate: bool,
    snapshot: &[(String, String)],
) -> Response {
    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/json")
        .to_owned();

    if content_type.starts_with("text/event-stream") {
        let stream = hydrate_sse_stream(response.bytes_stream(), snapshot.to_vec());
        let mut client_response = Response::new(Body::from_stream(stream));
        *client_response.status_mut() = status;
        let headers = client_response.headers_mut();
        if let Ok(value) = content_type.parse() {
            headers.insert(axum::http::header::CONTENT_TYPE, value);
        }
        headers.insert(
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-cache"),
        );
        return client_response;
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::from(e).into_response();
        }
    };

    if hydrate && content_type.starts_with("application/json") {
        if let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            hydrate_value(&mut value, snapshot);
            return (status, Json(value)).into_response();
        }
    }

    let mut client_response = Response::new(Body::from(bytes));
    *client_response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        client_response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, value);
    }
    client_response
}
