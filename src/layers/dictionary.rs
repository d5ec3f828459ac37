// ABOUTME: Guaranteed-redaction dictionary layer with a length-bucketed lowercase index
// ABOUTME: Longest-match-first single scan; mutations rebuild and atomically swap the index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Dictionary Layer
//!
//! Non-probabilistic redaction of administrator-supplied terms, confidence
//! exactly 1.0. Matching is a single left-to-right scan trying the longest
//! available term length first at every position; the index is a hash map
//! keyed by lowercase term bucketed by character length, so scan cost is
//! independent of dictionary size. Readers take an `Arc` snapshot of the
//! index; writers rebuild and swap it after mutating durable storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::layers::{is_word_char, LayerResult};
use crate::models::{DictionaryEntry, PiiDetection, RedactionLayer, TokenBinding};
use crate::tokenizer::PlaceholderFactory;

/// Maximum accepted term length in characters
pub const MAX_TERM_LEN: usize = 1000;

/// Category tag emitted for dictionary detections
const CATEGORY: &str = "DICTIONARY";

/// Immutable scan index: lowercase term -> entry, bucketed by char length
#[derive(Debug, Default)]
struct DictionaryIndex {
    buckets: HashMap<usize, HashMap<String, DictionaryEntry>>,
    /// Bucket lengths, descending, so the longest candidate wins
    lengths: Vec<usize>,
}

impl DictionaryIndex {
    fn build(entries: &[DictionaryEntry]) -> Self {
        let mut buckets: HashMap<usize, HashMap<String, DictionaryEntry>> = HashMap::new();
        for entry in entries.iter().filter(|e| e.enabled) {
            let key = entry.term.to_lowercase();
            buckets
                .entry(key.chars().count())
                .or_default()
                .insert(key, entry.clone());
        }
        let mut lengths: Vec<usize> = buckets.keys().copied().collect();
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        Self { buckets, lengths }
    }
}

/// The dictionary redaction layer
pub struct DictionaryLayer {
    database: Arc<Database>,
    index: RwLock<Arc<DictionaryIndex>>,
}

impl DictionaryLayer {
    /// Create the layer and load the index from durable storage
    ///
    /// # Errors
    ///
    /// Returns an error if the dictionary table cannot be read.
    pub async fn new(database: Arc<Database>) -> AppResult<Self> {
        let layer = Self {
            database,
            index: RwLock::new(Arc::new(DictionaryIndex::default())),
        };
        layer.reload().await?;
        Ok(layer)
    }

    /// Rebuild the in-memory index from durable storage
    async fn reload(&self) -> AppResult<()> {
        let entries = self.database.list_dictionary_entries().await?;
        let index = Arc::new(DictionaryIndex::build(&entries));
        if let Ok(mut guard) = self.index.write() {
            *guard = index;
        }
        Ok(())
    }

    /// Take a read snapshot of the index
    fn snapshot(&self) -> Arc<DictionaryIndex> {
        self.index
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    /// Add entries, persisting enabled ones and removing disabled ones.
    ///
    /// Idempotent on id (upsert). A term that already exists under a
    /// different id (case-insensitive) is a recoverable duplicate reported
    /// as a conflict.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty or over-length terms, a conflict for
    /// duplicate terms, or a database error.
    pub async fn add(&self, entries: Vec<DictionaryEntry>) -> AppResult<Vec<DictionaryEntry>> {
        for entry in &entries {
            if entry.term.is_empty() {
                return Err(AppError::invalid_input("dictionary term must not be empty"));
            }
            if entry.term.chars().count() > MAX_TERM_LEN {
                return Err(AppError::invalid_input(format!(
                    "dictionary term exceeds {MAX_TERM_LEN} characters"
                )));
            }
        }

        let existing = self.database.list_dictionary_entries().await?;
        let mut accepted = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.enabled {
                self.database
                    .delete_dictionary_entries_by_id(&[entry.id.clone()])
                    .await?;
                continue;
            }
            let lower = entry.term.to_lowercase();
            let duplicate = existing
                .iter()
                .chain(accepted.iter())
                .any(|e: &DictionaryEntry| e.id != entry.id && e.term.to_lowercase() == lower);
            if duplicate {
                return Err(AppError::conflict(format!(
                    "dictionary term already exists: {}",
                    entry.term
                )));
            }
            self.database.upsert_dictionary_entry(&entry).await?;
            accepted.push(entry);
        }

        self.reload().await?;
        Ok(accepted)
    }

    /// Remove entries by id; returns the number removed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete or index reload fails.
    pub async fn remove_by_id(&self, ids: &[String]) -> AppResult<u64> {
        let removed = self.database.delete_dictionary_entries_by_id(ids).await?;
        self.reload().await?;
        Ok(removed)
    }

    /// Remove entries by term name (case-insensitive); returns the number removed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete or index reload fails.
    pub async fn remove_by_terms(&self, terms: &[String]) -> AppResult<u64> {
        let removed = self.database.delete_dictionary_entries_by_term(terms).await?;
        self.reload().await?;
        Ok(removed)
    }

    /// Remove every entry; returns the number removed
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete or index reload fails.
    pub async fn clear(&self) -> AppResult<u64> {
        let removed = self.database.clear_dictionary().await?;
        self.reload().await?;
        Ok(removed)
    }

    /// List entries in insertion order
    ///
    /// # Errors
    ///
    /// Returns a database error if the read fails.
    pub async fn list(&self) -> AppResult<Vec<DictionaryEntry>> {
        self.database.list_dictionary_entries().await
    }

    /// Case-insensitive membership test against the live index
    #[must_use]
    pub fn has_term(&self, term: &str) -> bool {
        let lower = term.to_lowercase();
        let index = self.snapshot();
        index
            .buckets
            .get(&lower.chars().count())
            .is_some_and(|bucket| bucket.contains_key(&lower))
    }

    /// Number of enabled terms in the live index
    #[must_use]
    pub fn term_count(&self) -> usize {
        let index = self.snapshot();
        index.buckets.values().map(HashMap::len).sum()
    }

    /// Redact dictionary terms from `text`.
    ///
    /// Single left-to-right scan; at each position the longest bucketed
    /// length is attempted first and the first hit decides the match. The
    /// scan cursor then jumps past the match, so matches never overlap.
    /// Replacement happens right-to-left so recorded indices stay valid.
    #[must_use]
    pub fn redact(&self, text: &str, factory: &PlaceholderFactory) -> LayerResult {
        let index = self.snapshot();
        if index.lengths.is_empty() || text.is_empty() {
            return LayerResult::unchanged(text);
        }

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let text_len = text.len();
        let byte_at = |char_pos: usize| {
            if char_pos < n {
                chars[char_pos].0
            } else {
                text_len
            }
        };

        struct Match {
            char_start: usize,
            char_end: usize,
        }

        let mut matches: Vec<Match> = Vec::new();
        let mut i = 0;
        while i < n {
            let mut matched_len = None;
            for &len in &index.lengths {
                if i + len > n {
                    continue;
                }
                let slice = &text[byte_at(i)..byte_at(i + len)];
                let lower = slice.to_lowercase();
                let Some(entry) = index.buckets.get(&len).and_then(|b| b.get(&lower)) else {
                    continue;
                };
                if entry.case_sensitive && slice != entry.term {
                    continue;
                }
                if entry.whole_word {
                    let before_ok = i == 0 || !is_word_char(chars[i - 1].1);
                    let after_ok = i + len >= n || !is_word_char(chars[i + len].1);
                    if !before_ok || !after_ok {
                        continue;
                    }
                }
                matches.push(Match {
                    char_start: i,
                    char_end: i + len,
                });
                matched_len = Some(len);
                break;
            }
            i += matched_len.unwrap_or(1);
        }

        if matches.is_empty() {
            return LayerResult::unchanged(text);
        }

        let mut result = text.to_owned();
        let mut tokens = Vec::with_capacity(matches.len());
        let mut detections = Vec::with_capacity(matches.len());
        for m in matches.iter().rev() {
            let (start, end) = (byte_at(m.char_start), byte_at(m.char_end));
            let value = text[start..end].to_owned();
            let placeholder = factory.mint();
            result.replace_range(start..end, &placeholder);
            tokens.push(TokenBinding {
                placeholder: placeholder.clone(),
                original: value.clone(),
                layer: RedactionLayer::Dictionary,
                category: CATEGORY.to_owned(),
                meta: None,
            });
            detections.push(PiiDetection {
                layer: RedactionLayer::Dictionary,
                category: CATEGORY.to_owned(),
                value,
                start_index: m.char_start,
                end_index: m.char_end,
                confidence: 1.0,
            });
        }
        // Scan order for callers, not replacement order
        tokens.reverse();
        detections.reverse();

        tracing::debug!(matches = matches.len(), "dictionary layer matched");

        LayerResult {
            text: result,
            tokens,
            detections,
        }
    }
}
