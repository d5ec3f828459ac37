// ABOUTME: Durable session store mapping placeholders to originals with TTL management
// ABOUTME: Serializes writes per session, deduplicates by case-insensitive original, sweeps expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Rehydration Store
//!
//! Sessions accumulate `placeholder -> original` bindings across requests.
//! Writes for one session are serialized behind a per-session async mutex so
//! concurrent redactions merge instead of losing updates; reads go straight
//! to storage. Expired rows are removed lazily on retrieve and eagerly by a
//! 60-second background sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{is_valid_session_id, Session, TokenBinding};

/// Default session TTL
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Maximum TTL accepted by the management surface
pub const MAX_TTL_SECS: i64 = 86_400;

/// Hard ceiling on bindings per session
pub const MAX_TOKENS_PER_SESSION: usize = 10_000;

/// Result of one [`RehydrationStore::store`] merge
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    /// The session after the merge
    pub session: Session,
    /// Fresh placeholder -> already-bound placeholder, for every binding
    /// whose original was a case-insensitive repeat of one in the session
    pub aliases: HashMap<String, String>,
}

impl StoreOutcome {
    /// Rewrite text so any freshly minted duplicate placeholder becomes the
    /// placeholder the session already binds for that original.
    ///
    /// Placeholders share one wire format, so the rewrite is
    /// length-preserving and leaves detection indices valid.
    #[must_use]
    pub fn rewrite(&self, text: &str) -> String {
        if self.aliases.is_empty() {
            return text.to_owned();
        }
        let mut result = text.to_owned();
        for (minted, canonical) in &self.aliases {
            if result.contains(minted.as_str()) {
                result = result.replace(minted.as_str(), canonical);
            }
        }
        result
    }
}

/// Sweeper cadence
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Durable session store
pub struct RehydrationStore {
    database: Arc<Database>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RehydrationStore {
    /// Create the store over the shared database handle
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn validate_ttl(ttl_seconds: i64) -> AppResult<i64> {
        if ttl_seconds <= 0 || ttl_seconds > MAX_TTL_SECS {
            return Err(AppError::invalid_input(format!(
                "ttl must be between 1 and {MAX_TTL_SECS} seconds"
            )));
        }
        Ok(ttl_seconds)
    }

    /// Merge new bindings into a session, creating it if absent.
    ///
    /// Bindings whose `original` already exists in the session
    /// (case-insensitively) are not stored again; their freshly minted
    /// placeholder is instead reported in [`StoreOutcome::aliases`] mapped
    /// to the placeholder already bound to that original. Callers MUST
    /// rewrite any text carrying the fresh placeholder via
    /// [`StoreOutcome::rewrite`] before returning or forwarding it —
    /// otherwise that placeholder could never be hydrated back. The
    /// session TTL is refreshed on every store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed session id or TTL, or a
    /// database error — callers must treat that as fatal for the request so
    /// PII is never forwarded without its stored mapping.
    pub async fn store(
        &self,
        session_id: &str,
        new_tokens: Vec<TokenBinding>,
        ttl_seconds: i64,
    ) -> AppResult<StoreOutcome> {
        if !is_valid_session_id(session_id) {
            return Err(AppError::invalid_input("invalid session id"));
        }
        let ttl = Self::validate_ttl(ttl_seconds)?;

        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let existing = self
            .database
            .get_session_row(session_id)
            .await?
            .filter(|s| s.expires_at > now);

        let mut session = existing.unwrap_or_else(|| Session {
            session_id: session_id.to_owned(),
            tokens: Vec::new(),
            created_at: now,
            expires_at: now,
            last_accessed_at: now,
        });

        let mut aliases: HashMap<String, String> = HashMap::new();
        for token in new_tokens {
            let lower = token.original.to_lowercase();
            let canonical = session
                .tokens
                .iter()
                .find(|t| t.original.to_lowercase() == lower)
                .map(|t| t.placeholder.clone());
            if let Some(canonical) = canonical {
                if canonical != token.placeholder {
                    aliases.insert(token.placeholder, canonical);
                }
                continue;
            }
            if session.tokens.len() >= MAX_TOKENS_PER_SESSION {
                // A silently dropped mapping could never be hydrated back
                return Err(AppError::invalid_input(format!(
                    "session token limit of {MAX_TOKENS_PER_SESSION} reached"
                )));
            }
            session.tokens.push(token);
        }

        session.expires_at = now + chrono::Duration::seconds(ttl);
        session.last_accessed_at = now;
        self.database.upsert_session(&session).await?;
        Ok(StoreOutcome { session, aliases })
    }

    /// Fetch a live session. Malformed ids and expired rows read as absent;
    /// expired rows are deleted on the way out.
    ///
    /// # Errors
    ///
    /// Returns a database error if the read fails.
    pub async fn retrieve(&self, session_id: &str) -> AppResult<Option<Session>> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }
        let Some(session) = self.database.get_session_row(session_id).await? else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            self.database.delete_session(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Replace every placeholder occurrence in `text` with its original.
    ///
    /// Placeholders are pairwise disjoint by construction, so substitution
    /// order does not matter.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the session is absent or expired.
    pub async fn hydrate(&self, text: &str, session_id: &str) -> AppResult<String> {
        let session = self
            .retrieve(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session"))?;
        Ok(hydrate_with(text, &session.tokens))
    }

    /// Delete one session; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete fails.
    pub async fn delete(&self, session_id: &str) -> AppResult<bool> {
        self.locks.remove(session_id);
        self.database.delete_session(session_id).await
    }

    /// Delete every session; returns the number removed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete fails.
    pub async fn delete_all(&self) -> AppResult<u64> {
        self.locks.clear();
        self.database.delete_all_sessions().await
    }

    /// Refresh a live session's expiry; returns false if absent or expired
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed id or TTL, or a database error.
    pub async fn extend(&self, session_id: &str, ttl_seconds: i64) -> AppResult<bool> {
        if !is_valid_session_id(session_id) {
            return Err(AppError::invalid_input("invalid session id"));
        }
        let ttl = Self::validate_ttl(ttl_seconds)?;

        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let Some(mut session) = self
            .database
            .get_session_row(session_id)
            .await?
            .filter(|s| s.expires_at > now)
        else {
            return Ok(false);
        };
        session.expires_at = now + chrono::Duration::seconds(ttl);
        session.last_accessed_at = now;
        self.database.upsert_session(&session).await?;
        Ok(true)
    }

    /// Number of stored sessions (including not-yet-swept expired rows)
    ///
    /// # Errors
    ///
    /// Returns a database error if the count fails.
    pub async fn size(&self) -> AppResult<i64> {
        self.database.count_sessions().await
    }

    /// All live sessions, newest first
    ///
    /// # Errors
    ///
    /// Returns a database error if the read fails.
    pub async fn get_all(&self) -> AppResult<Vec<Session>> {
        let now = Utc::now();
        Ok(self
            .database
            .list_sessions()
            .await?
            .into_iter()
            .filter(|s| s.expires_at > now)
            .collect())
    }

    /// Sessions with a binding matching `query` case-insensitively in the
    /// original value, category, or metadata values
    ///
    /// # Errors
    ///
    /// Returns a database error if the read fails.
    pub async fn search(&self, query: &str) -> AppResult<Vec<Session>> {
        let needle = query.to_lowercase();
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|session| {
                session.tokens.iter().any(|t| {
                    t.original.to_lowercase().contains(&needle)
                        || t.category.to_lowercase().contains(&needle)
                        || t.meta.as_ref().is_some_and(|meta| {
                            meta.values().any(|v| v.to_lowercase().contains(&needle))
                        })
                })
            })
            .collect())
    }

    /// Remove expired rows; returns the number removed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete fails.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.database.delete_expired_sessions(now).await
    }

    /// Spawn the 60-second expiry sweeper. Abort the handle on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.sweep(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "swept expired sessions"),
                    Err(e) => tracing::warn!("session sweep failed: {e}"),
                }
            }
        })
    }
}

/// Apply a binding list to `text`
#[must_use]
pub fn hydrate_with(text: &str, tokens: &[TokenBinding]) -> String {
    let mut result = text.to_owned();
    for token in tokens {
        if result.contains(&token.placeholder) {
            result = result.replace(&token.placeholder, &token.original);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_session_id, RedactionLayer};

    fn binding(placeholder: &str, original: &str) -> TokenBinding {
        TokenBinding {
            placeholder: placeholder.to_owned(),
            original: original.to_owned(),
            layer: RedactionLayer::Regex,
            category: "EMAIL".to_owned(),
            meta: None,
        }
    }

    async fn store() -> RehydrationStore {
        RehydrationStore::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn store_and_retrieve_round_trip() {
        let store = store().await;
        let id = new_session_id();
        store
            .store(&id, vec![binding("\u{E000}aa\u{E001}", "a@b.co")], 3600)
            .await
            .unwrap();
        let session = store.retrieve(&id).await.unwrap().unwrap();
        assert_eq!(session.tokens.len(), 1);
        assert!(session.expires_at > session.created_at);
    }

    #[tokio::test]
    async fn invalid_session_id_store_fails_retrieve_is_none() {
        let store = store().await;
        assert!(store.store("nope", vec![], 3600).await.is_err());
        assert!(store.retrieve("nope").await.unwrap().is_none());
        assert!(store.extend("nope", 60).await.is_err());
    }

    #[tokio::test]
    async fn originals_deduplicate_case_insensitively() {
        let store = store().await;
        let id = new_session_id();
        store
            .store(&id, vec![binding("[p1]", "Sarah")], 3600)
            .await
            .unwrap();
        let outcome = store
            .store(
                &id,
                vec![binding("[p2]", "SARAH"), binding("[p3]", "other")],
                3600,
            )
            .await
            .unwrap();
        assert_eq!(outcome.session.tokens.len(), 2);
        assert_eq!(outcome.session.tokens[0].placeholder, "[p1]");
        // The dropped duplicate is reported as an alias to the existing
        // placeholder; the fresh binding is not
        assert_eq!(outcome.aliases.get("[p2]"), Some(&"[p1]".to_owned()));
        assert!(!outcome.aliases.contains_key("[p3]"));
    }

    #[tokio::test]
    async fn restoring_the_same_binding_produces_no_alias() {
        let store = store().await;
        let id = new_session_id();
        store
            .store(&id, vec![binding("[p1]", "Sarah")], 3600)
            .await
            .unwrap();
        let outcome = store
            .store(&id, vec![binding("[p1]", "Sarah")], 3600)
            .await
            .unwrap();
        assert_eq!(outcome.session.tokens.len(), 1);
        assert!(outcome.aliases.is_empty());
    }

    #[tokio::test]
    async fn rewrite_swaps_duplicate_placeholders_for_canonical() {
        let store = store().await;
        let id = new_session_id();
        store
            .store(&id, vec![binding("[p1]", "Sarah")], 3600)
            .await
            .unwrap();
        let outcome = store
            .store(&id, vec![binding("[p2]", "SARAH")], 3600)
            .await
            .unwrap();
        assert_eq!(outcome.rewrite("hi [p2], bye [p2]"), "hi [p1], bye [p1]");
        // Rewritten text hydrates through the stored binding
        let hydrated = store
            .hydrate(&outcome.rewrite("hi [p2]"), &id)
            .await
            .unwrap();
        assert_eq!(hydrated, "hi Sarah");
    }

    #[tokio::test]
    async fn bindings_accumulate_across_stores() {
        let store = store().await;
        let id = new_session_id();
        store.store(&id, vec![binding("[p1]", "one")], 3600).await.unwrap();
        store.store(&id, vec![binding("[p2]", "two")], 3600).await.unwrap();
        let session = store.retrieve(&id).await.unwrap().unwrap();
        assert_eq!(session.tokens.len(), 2);
    }

    #[tokio::test]
    async fn expired_sessions_read_as_absent() {
        let store = store().await;
        let id = new_session_id();
        store.store(&id, vec![binding("[p1]", "x")], 1).await.unwrap();
        // Force expiry by rewinding the stored row
        let mut session = store.retrieve(&id).await.unwrap().unwrap();
        session.expires_at = Utc::now() - chrono::Duration::seconds(5);
        store.database.upsert_session(&session).await.unwrap();

        assert!(store.retrieve(&id).await.unwrap().is_none());
        // Lazy deletion removed the row
        assert!(store.database.get_session_row(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_removes_expired_rows() {
        let store = store().await;
        let id = new_session_id();
        store.store(&id, vec![binding("[p1]", "x")], 3600).await.unwrap();
        let mut session = store.database.get_session_row(&id).await.unwrap().unwrap();
        session.expires_at = Utc::now() - chrono::Duration::seconds(5);
        store.database.upsert_session(&session).await.unwrap();

        let removed = store.sweep(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hydrate_restores_originals() {
        let store = store().await;
        let id = new_session_id();
        store
            .store(
                &id,
                vec![binding("\u{E000}aa\u{E001}", "a@b.co"), binding("\u{E000}bb\u{E001}", "Sarah")],
                3600,
            )
            .await
            .unwrap();
        let hydrated = store
            .hydrate("mail \u{E000}aa\u{E001} from \u{E000}bb\u{E001}", &id)
            .await
            .unwrap();
        assert_eq!(hydrated, "mail a@b.co from Sarah");
    }

    #[tokio::test]
    async fn hydrate_missing_session_is_not_found() {
        let store = store().await;
        let err = store.hydrate("text", &new_session_id()).await.unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ResourceNotFound);
    }

    #[tokio::test]
    async fn extend_refreshes_expiry() {
        let store = store().await;
        let id = new_session_id();
        store.store(&id, vec![binding("[p1]", "x")], 60).await.unwrap();
        let before = store.retrieve(&id).await.unwrap().unwrap().expires_at;
        assert!(store.extend(&id, 7200).await.unwrap());
        let after = store.retrieve(&id).await.unwrap().unwrap().expires_at;
        assert!(after > before);
        assert!(!store.extend(&new_session_id(), 60).await.unwrap());
    }

    #[tokio::test]
    async fn ttl_bounds_enforced() {
        let store = store().await;
        let id = new_session_id();
        assert!(store.store(&id, vec![], 0).await.is_err());
        assert!(store.store(&id, vec![], MAX_TTL_SECS + 1).await.is_err());
        assert!(store.store(&id, vec![], MAX_TTL_SECS).await.is_ok());
    }

    #[tokio::test]
    async fn search_matches_original_category_and_meta() {
        let store = store().await;
        let id = new_session_id();
        let mut tagged = binding("[p1]", "Sarah");
        tagged.meta = Some(
            [("source".to_owned(), "intake form".to_owned())]
                .into_iter()
                .collect(),
        );
        store.store(&id, vec![tagged], 3600).await.unwrap();

        assert_eq!(store.search("sarah").await.unwrap().len(), 1);
        assert_eq!(store.search("email").await.unwrap().len(), 1);
        assert_eq!(store.search("intake").await.unwrap().len(), 1);
        assert!(store.search("absent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_all_orders_newest_first() {
        let store = store().await;
        let first = new_session_id();
        let second = new_session_id();
        store.store(&first, vec![binding("[p1]", "a")], 3600).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.store(&second, vec![binding("[p2]", "b")], 3600).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session_id, second);
    }
}
