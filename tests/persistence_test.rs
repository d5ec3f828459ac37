// ABOUTME: Durable-store tests against a real database file
// ABOUTME: Sessions, settings and dictionary entries survive a close-and-reopen cycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use std::sync::Arc;

use anonamoose::database::Database;
use anonamoose::layers::dictionary::DictionaryLayer;
use anonamoose::models::{new_session_id, DictionaryEntry, RedactionLayer, TokenBinding};
use anonamoose::rehydration::RehydrationStore;
use anonamoose::settings::SettingsStore;

fn binding(placeholder: &str, original: &str) -> TokenBinding {
    TokenBinding {
        placeholder: placeholder.to_owned(),
        original: original.to_owned(),
        layer: RedactionLayer::Dictionary,
        category: "DICTIONARY".to_owned(),
        meta: None,
    }
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anonamoose.db");
    let path = path.to_str().unwrap();
    let session_id = new_session_id();

    {
        let database = Arc::new(Database::new(path).await.unwrap());

        let store = RehydrationStore::new(Arc::clone(&database));
        store
            .store(&session_id, vec![binding("\u{E000}ab\u{E001}", "Acme Corp")], 3600)
            .await
            .unwrap();

        let settings = SettingsStore::new(Arc::clone(&database));
        let mut changes = std::collections::BTreeMap::new();
        changes.insert("locale".to_owned(), serde_json::json!("AU"));
        settings.update(&changes).await.unwrap();

        let dictionary = DictionaryLayer::new(Arc::clone(&database)).await.unwrap();
        dictionary
            .add(vec![DictionaryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                term: "Acme Corp".to_owned(),
                replacement: None,
                case_sensitive: false,
                whole_word: false,
                enabled: true,
                created_at: chrono::Utc::now(),
            }])
            .await
            .unwrap();

        database.pool().close().await;
    }

    let database = Arc::new(Database::new(path).await.unwrap());

    let store = RehydrationStore::new(Arc::clone(&database));
    let session = store.retrieve(&session_id).await.unwrap().unwrap();
    assert_eq!(session.tokens.len(), 1);
    assert_eq!(session.tokens[0].original, "Acme Corp");

    let settings = SettingsStore::new(Arc::clone(&database));
    let snapshot = settings.snapshot().await.unwrap();
    assert_eq!(snapshot.locale, Some(anonamoose::models::Locale::AU));

    let dictionary = DictionaryLayer::new(database).await.unwrap();
    assert!(dictionary.has_term("acme corp"));
}
