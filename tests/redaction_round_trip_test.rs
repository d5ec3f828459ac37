// ABOUTME: End-to-end tests for redaction round-trips through the rehydration store
// ABOUTME: Covers hydrate-inverts-redact, idempotence and cross-request accumulation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use std::sync::Arc;

use async_trait::async_trait;

use anonamoose::database::Database;
use anonamoose::errors::{AppError, AppResult};
use anonamoose::layers::dictionary::DictionaryLayer;
use anonamoose::layers::ner::{ClassifierFactory, NerLayer, TokenClassifier};
use anonamoose::models::{new_session_id, DictionaryEntry};
use anonamoose::pipeline::RedactionPipeline;
use anonamoose::rehydration::RehydrationStore;
use anonamoose::settings::RedactionSettings;

struct NoModel;

#[async_trait]
impl ClassifierFactory for NoModel {
    async fn load(&self, _model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
        Err(AppError::internal("no model in tests"))
    }
}

struct Harness {
    pipeline: RedactionPipeline,
    dictionary: Arc<DictionaryLayer>,
    store: RehydrationStore,
}

async fn harness() -> Harness {
    let database = Arc::new(Database::in_memory().await.unwrap());
    let dictionary = Arc::new(DictionaryLayer::new(Arc::clone(&database)).await.unwrap());
    Harness {
        pipeline: RedactionPipeline::new(
            Arc::clone(&dictionary),
            Arc::new(NerLayer::new(Box::new(NoModel))),
        ),
        dictionary,
        store: RehydrationStore::new(database),
    }
}

fn dictionary_entry(term: &str) -> DictionaryEntry {
    DictionaryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        term: term.to_owned(),
        replacement: None,
        case_sensitive: false,
        whole_word: false,
        enabled: true,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn hydrate_inverts_redact() {
    let h = harness().await;
    h.dictionary
        .add(vec![dictionary_entry("Acme Corp")])
        .await
        .unwrap();

    let text = "Acme Corp billing: write to ops@acme.example or 203.0.113.9, \
                card 4532 0151 1283 0366.";
    let session_id = new_session_id();
    let settings = RedactionSettings::default();

    let outcome = h.pipeline.redact(text, &settings).await;
    assert!(outcome.detections.len() >= 4);
    assert_ne!(outcome.redacted_text, text);

    h.store
        .store(&session_id, outcome.tokens.clone(), 3600)
        .await
        .unwrap();
    let hydrated = h.store.hydrate(&outcome.redacted_text, &session_id).await.unwrap();
    assert_eq!(hydrated, text);
}

#[tokio::test]
async fn second_redaction_finds_nothing() {
    let h = harness().await;
    let settings = RedactionSettings::default();
    let first = h
        .pipeline
        .redact("mail sarah.j@company.co.nz about 10.0.0.1", &settings)
        .await;
    let second = h.pipeline.redact(&first.redacted_text, &settings).await;
    assert!(second.detections.is_empty());
    assert_eq!(second.redacted_text, first.redacted_text);
}

#[tokio::test]
async fn sessions_accumulate_and_dedupe_across_calls() {
    let h = harness().await;
    let settings = RedactionSettings::default();
    let session_id = new_session_id();

    let first = h
        .pipeline
        .redact("contact a@example.com", &settings)
        .await;
    h.store
        .store(&session_id, first.tokens.clone(), 3600)
        .await
        .unwrap();

    // Same original again (different case) plus a new one. The pipeline
    // mints blind, so the repeat arrives under a fresh placeholder.
    let second = h
        .pipeline
        .redact("contact A@EXAMPLE.COM and b@example.com", &settings)
        .await;
    let stored = h
        .store
        .store(&session_id, second.tokens.clone(), 3600)
        .await
        .unwrap();

    let session = h.store.retrieve(&session_id).await.unwrap().unwrap();
    assert_eq!(session.tokens.len(), 2);

    // The repeat's fresh placeholder is not stored; it aliases to the
    // binding the first call created
    assert_eq!(
        stored.aliases.get(&second.tokens[0].placeholder),
        Some(&first.tokens[0].placeholder)
    );

    // After the caller-side rewrite, the second call's text hydrates with
    // no placeholder left behind — the repeat resolves to the stored
    // original
    let rewritten = stored.rewrite(&second.redacted_text);
    let hydrated = h.store.hydrate(&rewritten, &session_id).await.unwrap();
    assert_eq!(hydrated, "contact a@example.com and b@example.com");
    assert!(!hydrated.contains('\u{E000}'));

    // Placeholders from either call hydrate to their originals
    let mixed = format!(
        "{} / {}",
        first.tokens[0].placeholder, second.tokens[1].placeholder
    );
    let hydrated = h.store.hydrate(&mixed, &session_id).await.unwrap();
    assert_eq!(hydrated, "a@example.com / b@example.com");
}

#[tokio::test]
async fn no_two_bindings_share_a_case_folded_original() {
    let h = harness().await;
    let settings = RedactionSettings::default();
    let session_id = new_session_id();

    for text in [
        "first: report@example.com",
        "second: REPORT@EXAMPLE.COM",
        "third: Report@Example.Com plus extra@example.com",
    ] {
        let outcome = h.pipeline.redact(text, &settings).await;
        h.store.store(&session_id, outcome.tokens, 3600).await.unwrap();
    }

    let session = h.store.retrieve(&session_id).await.unwrap().unwrap();
    let mut originals: Vec<String> = session
        .tokens
        .iter()
        .map(|t| t.original.to_lowercase())
        .collect();
    originals.sort();
    let before = originals.len();
    originals.dedup();
    assert_eq!(before, originals.len());
    assert_eq!(before, 2);
}

#[tokio::test]
async fn placeholder_wire_format_is_stable() {
    let h = harness().await;
    let settings = RedactionSettings::default();
    let outcome = h.pipeline.redact("ping 198.51.100.4", &settings).await;
    assert_eq!(outcome.tokens.len(), 1);
    let placeholder = &outcome.tokens[0].placeholder;
    // prefix + 16 hex + suffix = 18 code points
    assert_eq!(placeholder.chars().count(), 18);
    assert!(placeholder.starts_with('\u{E000}'));
    assert!(placeholder.ends_with('\u{E001}'));
    assert!(outcome.redacted_text.contains(placeholder.as_str()));
}
