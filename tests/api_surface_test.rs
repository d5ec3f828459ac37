// ABOUTME: HTTP surface tests over the assembled router without a live upstream
// ABOUTME: Covers auth guards, boundary validation, dictionary conflicts and session endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use anonamoose::config::{LogLevel, ServerConfig};
use anonamoose::database::Database;
use anonamoose::errors::{AppError, AppResult};
use anonamoose::layers::dictionary::DictionaryLayer;
use anonamoose::layers::ner::{ClassifierFactory, NerLayer, TokenClassifier};
use anonamoose::models::new_session_id;
use anonamoose::observability::ObservabilityRing;
use anonamoose::pipeline::RedactionPipeline;
use anonamoose::rate_limiting::RateLimiter;
use anonamoose::rehydration::RehydrationStore;
use anonamoose::routes::{router, ServerResources};
use anonamoose::session_map::SessionTokenMap;
use anonamoose::settings::SettingsStore;
use anonamoose::upstream::UpstreamClient;

struct NoModel;

#[async_trait]
impl ClassifierFactory for NoModel {
    async fn load(&self, _model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
        Err(AppError::internal("no model in tests"))
    }
}

fn test_config(api_token: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        api_token: api_token.map(ToOwned::to_owned),
        stats_token: None,
        db_path: ":memory:".to_owned(),
        cors_origin: None,
        ner_endpoint: "http://127.0.0.1:1".to_owned(),
        ner_model_cache: None,
        log_level: LogLevel::Info,
        log_json: false,
    }
}

async fn app(api_token: Option<&str>) -> axum::Router {
    let database = Arc::new(Database::in_memory().await.unwrap());
    let dictionary = Arc::new(DictionaryLayer::new(Arc::clone(&database)).await.unwrap());
    let ner = Arc::new(NerLayer::new(Box::new(NoModel)));
    let resources = Arc::new(ServerResources {
        config: test_config(api_token),
        settings: SettingsStore::new(Arc::clone(&database)),
        pipeline: RedactionPipeline::new(Arc::clone(&dictionary), Arc::clone(&ner)),
        dictionary,
        ner,
        rehydration: Arc::new(RehydrationStore::new(Arc::clone(&database))),
        session_maps: Arc::new(SessionTokenMap::new()),
        upstream: UpstreamClient::new().unwrap(),
        observability: Arc::new(ObservabilityRing::new()),
        rate_limiter: RateLimiter::default(),
        database,
    });
    router(resources)
}

fn request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn get(uri: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let app = app(None).await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn redact_endpoint_detects_and_returns_session() {
    let app = app(None).await;
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/redact",
            serde_json::json!({"text": "Email me at sarah.j@company.co.nz"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["detections"].as_array().unwrap().len(), 1);
    assert_eq!(body["detections"][0]["type"], "regex");
    assert_eq!(body["detections"][0]["category"], "EMAIL");
    assert_eq!(body["detections"][0]["confidence"], 0.95);
    let session_id = body["sessionId"].as_str().unwrap();
    assert_eq!(session_id.len(), 36);
    assert!(!body["redactedText"]
        .as_str()
        .unwrap()
        .contains("sarah.j@company.co.nz"));
}

#[tokio::test]
async fn redact_endpoint_enforces_text_cap() {
    let app = app(None).await;
    let oversized = "a".repeat(100_001);
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/redact",
            serde_json::json!({"text": oversized}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redact_endpoint_rejects_unknown_locale() {
    let app = app(None).await;
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/redact",
            serde_json::json!({"text": "hi", "locale": "FR"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redact_endpoint_requires_token_when_configured() {
    let app = app(Some("s3cret")).await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/redact",
            serde_json::json!({"text": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut authed = request(
        "POST",
        "/api/v1/redact",
        serde_json::json!({"text": "hi"}),
    );
    authed
        .headers_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    let response = app.oneshot(authed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn proxy_requires_authorization_header() {
    let app = app(None).await;
    let response = app
        .oneshot(request(
            "POST",
            "/v1/chat/completions",
            serde_json::json!({"model": "gpt-4o", "messages": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_dictionary_term_is_conflict() {
    let app = app(None).await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dictionary",
            serde_json::json!({"term": "Acme Corp"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/dictionary",
            serde_json::json!({"term": "ACME CORP"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn oversized_dictionary_term_is_rejected() {
    let app = app(None).await;
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/dictionary",
            serde_json::json!({"term": "x".repeat(1001)}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dictionary_listing_paginates() {
    let app = app(None).await;
    let entries: Vec<serde_json::Value> = (0..5)
        .map(|i| serde_json::json!({"term": format!("company {i}")}))
        .collect();
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dictionary",
            serde_json::json!({"entries": entries}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/v1/dictionary?page=2&limit=2"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["page"], 2);

    let response = app
        .oneshot(get("/api/v1/dictionary?q=company%204"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn session_flow_masks_originals_and_hydrates() {
    let app = app(None).await;
    let session_id = new_session_id();

    let mut redact = request(
        "POST",
        "/api/v1/redact",
        serde_json::json!({"text": "reach me at test@corp.example"}),
    );
    redact
        .headers_mut()
        .insert("x-anonamoose-session", session_id.parse().unwrap());
    let response = app.clone().oneshot(redact).await.unwrap();
    let body = json_body(response).await;
    let redacted_text = body["redactedText"].as_str().unwrap().to_owned();
    assert_eq!(body["sessionId"], session_id.as_str());

    // Listing masks originals
    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/sessions/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["tokens"][0]["original"], "[REDACTED]");

    // Hydrate restores the real value
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/hydrate"),
            serde_json::json!({"text": redacted_text}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["hydratedText"], "reach me at test@corp.example");

    // Extend refreshes expiry; bad TTL rejected
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/extend"),
            serde_json::json!({"ttl": 100_000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/extend"),
            serde_json::json!({"ttl": 7200}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete, then the session reads as absent
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/sessions/{session_id}"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .oneshot(get(&format!("/api/v1/sessions/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_original_across_calls_stays_hydratable() {
    let app = app(None).await;
    let session_id = new_session_id();

    let mut first = request(
        "POST",
        "/api/v1/redact",
        serde_json::json!({"text": "write to a@example.com"}),
    );
    first
        .headers_mut()
        .insert("x-anonamoose-session", session_id.parse().unwrap());
    let first = json_body(app.clone().oneshot(first).await.unwrap()).await;

    // Second call repeats the original in a different case and adds a new one
    let mut second = request(
        "POST",
        "/api/v1/redact",
        serde_json::json!({"text": "ping A@Example.Com and b@example.com"}),
    );
    second
        .headers_mut()
        .insert("x-anonamoose-session", session_id.parse().unwrap());
    let second = json_body(app.clone().oneshot(second).await.unwrap()).await;

    // The session holds the union of bindings, deduplicated
    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/sessions/{session_id}")))
        .await
        .unwrap();
    let session = json_body(response).await;
    assert_eq!(session["tokens"].as_array().unwrap().len(), 2);

    // The repeat leaves the server under the placeholder the session
    // already binds, so both texts hydrate fully
    let combined = format!(
        "{}\n{}",
        first["redactedText"].as_str().unwrap(),
        second["redactedText"].as_str().unwrap()
    );
    let response = app
        .oneshot(request(
            "POST",
            &format!("/api/v1/sessions/{session_id}/hydrate"),
            serde_json::json!({"text": combined}),
        ))
        .await
        .unwrap();
    let hydrated = json_body(response).await;
    let hydrated = hydrated["hydratedText"].as_str().unwrap();
    assert_eq!(
        hydrated,
        "write to a@example.com\nping a@example.com and b@example.com"
    );
    assert!(!hydrated.contains('\u{E000}'));
}

#[tokio::test]
async fn settings_put_is_partial_and_resets_ner() {
    let app = app(None).await;
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/v1/settings",
            serde_json::json!({"locale": "AU", "nerModel": "dslim/bert-base-NER"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["updated"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get("/api/v1/settings/locale"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["value"], "AU");

    // Untouched keys keep their defaults
    let response = app.oneshot(get("/api/v1/settings")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["enableDictionary"], true);
    assert_eq!(body["nerModel"], "dslim/bert-base-NER");
}

#[tokio::test]
async fn admin_verify_is_unauthenticated_and_constant_time() {
    let app = app(Some("s3cret")).await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/admin/verify",
            serde_json::json!({"token": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["valid"], false);

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/admin/verify",
            serde_json::json!({"token": "s3cret"}),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["valid"], true);
}

#[tokio::test]
async fn stats_public_is_open_but_stats_needs_token() {
    let app = app(Some("s3cret")).await;
    let response = app
        .clone()
        .oneshot(get("/api/v1/stats/public"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/api/v1/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut authed = get("/api/v1/stats");
    authed
        .headers_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    let response = app.oneshot(authed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn logs_ring_records_redactions() {
    let app = app(None).await;
    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/redact",
            serde_json::json!({"text": "mail x@y.example please"}),
        ))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/api/v1/redactions")).await.unwrap();
    let body = json_body(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source"], "api");

    let response = app.clone().oneshot(get("/api/v1/logs")).await.unwrap();
    let body = json_body(response).await;
    assert!(!body.as_array().unwrap().is_empty());

    // DELETE clears the ring
    let response = app
        .clone()
        .oneshot(request("DELETE", "/api/v1/redactions", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(get("/api/v1/redactions")).await.unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());
}
