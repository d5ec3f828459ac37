// ABOUTME: Transformer-backed named entity recognition layer with circuit breaker
// ABOUTME: Chunks long inputs, merges BIO-tagged subwords and locates entity occurrences
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # NER Layer
//!
//! Wraps a token-classification model behind the [`TokenClassifier`] trait.
//! The production classifier is an HTTP client to a local inference endpoint
//! serving the configured model; the chunking, BIO merging, filtering and
//! occurrence location all happen in-process.
//!
//! The model handle is process-wide and lazily initialized. A failed
//! initialization opens a circuit for 60 seconds: while open, redaction
//! passes text through unchanged with no detections. The first call after
//! the cool-down retries initialization. Changing the `nerModel` setting
//! invalidates the handle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::errors::{AppError, AppResult};
use crate::layers::LayerResult;
use crate::models::{PiiDetection, RedactionLayer, TokenBinding};
use crate::settings::RedactionSettings;
use crate::tokenizer::PlaceholderFactory;

/// Window size for chunked inference, in characters
pub const CHUNK_SIZE: usize = 1000;

/// Overlap between consecutive windows, in characters
pub const CHUNK_OVERLAP: usize = 200;

/// Cool-down before a failed model load is retried
pub const CIRCUIT_OPEN_SECS: u64 = 60;

/// Raw BIO-tagged entity emitted by the classifier
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntity {
    /// BIO label, e.g. `B-PER` or `I-ORG`
    pub entity: String,
    /// Token piece; subwords begin with `##`
    pub word: String,
    /// Model score in [0, 1]
    pub score: f64,
}

/// A merged multi-token entity
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntity {
    /// Category after BIO prefix stripping: PER, ORG, LOC or MISC
    pub category: String,
    /// Reassembled surface text
    pub word: String,
    /// Running arithmetic mean of the merged token scores
    pub score: f64,
}

/// Token-classification model abstraction
#[async_trait]
pub trait TokenClassifier: Send + Sync {
    /// Classify one chunk of text into raw BIO entities
    async fn classify(&self, text: &str) -> AppResult<Vec<RawEntity>>;
}

/// Builds classifiers for a model id; failure opens the circuit
#[async_trait]
pub trait ClassifierFactory: Send + Sync {
    /// Initialize a classifier handle for the given model identifier
    async fn load(&self, model: &str) -> AppResult<Arc<dyn TokenClassifier>>;
}

// ============================================================================
// HTTP inference client
// ============================================================================

/// HTTP client for a HuggingFace-style token-classification endpoint
pub struct HttpTokenClassifier {
    client: reqwest::Client,
    url: String,
}

#[derive(serde::Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

impl HttpTokenClassifier {
    /// Create a classifier for `model` served at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: &str, model: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::internal(format!("NER client build failed: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/models/{model}", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TokenClassifier for HttpTokenClassifier {
    async fn classify(&self, text: &str) -> AppResult<Vec<RawEntity>> {
        let response = self
            .client
            .post(&self.url)
            .json(&InferenceRequest { inputs: text })
            .send()
            .await
            .map_err(|e| AppError::internal(format!("NER inference request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::internal(format!(
                "NER inference returned status {}",
                response.status()
            )));
        }

        let entities: Vec<RawEntity> = response
            .json()
            .await
            .map_err(|e| AppError::internal(format!("NER inference response invalid: {e}")))?;
        Ok(entities)
    }
}

/// Default factory producing [`HttpTokenClassifier`] handles
pub struct HttpClassifierFactory {
    endpoint: String,
}

impl HttpClassifierFactory {
    /// Create a factory targeting the given inference endpoint
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ClassifierFactory for HttpClassifierFactory {
    async fn load(&self, model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
        let classifier = HttpTokenClassifier::new(&self.endpoint, model)?;
        // Warm-up probe verifies the endpoint can serve the model before the
        // handle is marked ready.
        classifier.classify("warmup").await?;
        Ok(Arc::new(classifier))
    }
}

// ============================================================================
// Circuit breaker
// ============================================================================

enum CircuitState {
    Uninitialized,
    Ready {
        model: String,
        classifier: Arc<dyn TokenClassifier>,
    },
    Open {
        until: Instant,
    },
}

/// The NER redaction layer
pub struct NerLayer {
    factory: Box<dyn ClassifierFactory>,
    state: Mutex<CircuitState>,
}

impl NerLayer {
    /// Create the layer with the given classifier factory
    #[must_use]
    pub fn new(factory: Box<dyn ClassifierFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(CircuitState::Uninitialized),
        }
    }

    /// Drop any loaded handle so the next call re-initializes
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = CircuitState::Uninitialized;
        tracing::info!("NER model handle reset");
    }

    /// Obtain a ready classifier, or `None` while the circuit is open
    async fn acquire(&self, model: &str) -> Option<Arc<dyn TokenClassifier>> {
        let mut state = self.state.lock().await;
        match &*state {
            CircuitState::Ready {
                model: loaded,
                classifier,
            } if loaded == model => return Some(Arc::clone(classifier)),
            CircuitState::Open { until } if Instant::now() < *until => return None,
            _ => {}
        }

        match self.factory.load(model).await {
            Ok(classifier) => {
                tracing::info!(model, "NER model loaded");
                *state = CircuitState::Ready {
                    model: model.to_owned(),
                    classifier: Arc::clone(&classifier),
                };
                Some(classifier)
            }
            Err(e) => {
                tracing::warn!(model, "NER model load failed, circuit open: {e}");
                *state = CircuitState::Open {
                    until: Instant::now() + Duration::from_secs(CIRCUIT_OPEN_SECS),
                };
                None
            }
        }
    }

    /// Redact named entities from `text`.
    ///
    /// Fails soft: any initialization or inference failure returns the input
    /// unchanged with no detections.
    pub async fn redact(
        &self,
        text: &str,
        settings: &RedactionSettings,
        factory: &PlaceholderFactory,
    ) -> LayerResult {
        let Some(classifier) = self.acquire(&settings.ner_model).await else {
            return LayerResult::unchanged(text);
        };

        let mut merged: Vec<MergedEntity> = Vec::new();
        for chunk in chunk_text(text) {
            match classifier.classify(&chunk).await {
                Ok(raw) => merged.extend(merge_bio_entities(&raw)),
                Err(e) => {
                    tracing::warn!("NER inference failed, layer bypassed: {e}");
                    return LayerResult::unchanged(text);
                }
            }
        }

        let entities = filter_entities(merged, settings.ner_min_confidence);
        apply_entities(text, &entities, factory)
    }
}

// ============================================================================
// Pure transformation steps
// ============================================================================

/// Split text into overlapping windows of [`CHUNK_SIZE`] characters.
///
/// The `CHUNK_SIZE - CHUNK_OVERLAP` step guarantees any entity shorter than
/// the overlap is fully contained in at least one window.
#[must_use]
pub fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= CHUNK_SIZE {
        return vec![text.to_owned()];
    }
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Merge raw BIO-tagged pieces into whole entities.
///
/// `B-X` starts a new entity; `I-X` extends the previous entity when the
/// category matches (`##` subwords join without a separator, other pieces
/// with a single space) and updates the running mean score. An orphan `I-X`
/// with no open entity is discarded.
#[must_use]
pub fn merge_bio_entities(raw: &[RawEntity]) -> Vec<MergedEntity> {
    let mut merged: Vec<(MergedEntity, usize)> = Vec::new();
    for piece in raw {
        let (prefix, category) = match piece.entity.split_once('-') {
            Some((p, c)) if p == "B" || p == "I" => (p, c),
            _ => continue,
        };
        let is_begin = prefix == "B";

        if is_begin {
            merged.push((
                MergedEntity {
                    category: category.to_owned(),
                    word: piece.word.trim_start_matches("##").to_owned(),
                    score: piece.score,
                },
                1,
            ));
            continue;
        }

        match merged.last_mut() {
            Some((last, count)) if last.category == category => {
                if let Some(subword) = piece.word.strip_prefix("##") {
                    last.word.push_str(subword);
                } else {
                    last.word.push(' ');
                    last.word.push_str(&piece.word);
                }
                *count += 1;
                last.score += (piece.score - last.score) / (*count as f64);
            }
            // Orphan I- tag or category mismatch
            _ => {}
        }
    }
    merged.into_iter().map(|(e, _)| e).collect()
}

/// Category tags accepted from the model, mapped to emitted categories
fn map_category(category: &str) -> Option<&'static str> {
    match category {
        "PER" => Some("PERSON"),
        "ORG" => Some("ORG"),
        "LOC" => Some("LOCATION"),
        "MISC" => Some("MISC"),
        _ => None,
    }
}

/// Drop low-score and unknown-category entities, then deduplicate by word
fn filter_entities(merged: Vec<MergedEntity>, min_confidence: f64) -> Vec<(String, String, f64)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    for entity in merged {
        if entity.score < min_confidence {
            continue;
        }
        let Some(category) = map_category(&entity.category) else {
            continue;
        };
        let word = entity.word.trim().to_owned();
        if word.is_empty() || !seen.insert(word.clone()) {
            continue;
        }
        kept.push((word, category.to_owned(), entity.score));
    }
    kept
}

/// Locate every case-insensitive occurrence of the kept entities and replace
/// them right-to-left; overlapping spans keep the longest, leftmost match.
fn apply_entities(
    text: &str,
    entities: &[(String, String, f64)],
    factory: &PlaceholderFactory,
) -> LayerResult {
    struct Span {
        start: usize,
        end: usize,
        category: String,
        score: f64,
    }

    let lower_text = text.to_lowercase();
    let mut spans: Vec<Span> = Vec::new();
    for (word, category, score) in entities {
        let needle = word.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let mut from = 0;
        while let Some(pos) = lower_text[from..].find(&needle) {
            let start = from + pos;
            spans.push(Span {
                start,
                end: start + needle.len(),
                category: category.clone(),
                score: *score,
            });
            from = start + needle.len();
        }
    }

    // Longest first, then leftmost, so the retained span at any position is
    // the longest available; later overlapping spans are discarded.
    spans.sort_by(|a, b| {
        (b.end - b.start)
            .cmp(&(a.end - a.start))
            .then(a.start.cmp(&b.start))
    });
    let mut accepted: Vec<Span> = Vec::new();
    for span in spans {
        let overlaps = accepted
            .iter()
            .any(|a| span.start < a.end && a.start < span.end);
        if !overlaps {
            accepted.push(span);
        }
    }
    accepted.sort_by_key(|s| s.start);

    if accepted.is_empty() {
        return LayerResult::unchanged(text);
    }

    let mut result = text.to_owned();
    let mut tokens = Vec::with_capacity(accepted.len());
    let mut detections = Vec::with_capacity(accepted.len());
    for span in accepted.iter().rev() {
        // Occurrence search on the lowercased text can only produce spans on
        // char boundaries of the original for ASCII-compatible needles; guard
        // anyway so multi-byte case folds never split a char.
        if !result.is_char_boundary(span.start) || !result.is_char_boundary(span.end) {
            continue;
        }
        let value = text[span.start..span.end].to_owned();
        let placeholder = factory.mint();
        result.replace_range(span.start..span.end, &placeholder);
        tokens.push(TokenBinding {
            placeholder: placeholder.clone(),
            original: value.clone(),
            layer: RedactionLayer::Ner,
            category: span.category.clone(),
            meta: None,
        });
        detections.push(PiiDetection {
            layer: RedactionLayer::Ner,
            category: span.category.clone(),
            value,
            start_index: text[..span.start].chars().count(),
            end_index: text[..span.end].chars().count(),
            confidence: span.score,
        });
    }
    tokens.reverse();
    detections.reverse();

    LayerResult {
        text: result,
        tokens,
        detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entity: &str, word: &str, score: f64) -> RawEntity {
        RawEntity {
            entity: entity.to_owned(),
            word: word.to_owned(),
            score,
        }
    }

    #[test]
    fn chunking_short_text_is_single_chunk() {
        assert_eq!(chunk_text("hello"), vec!["hello".to_owned()]);
    }

    #[test]
    fn chunking_covers_whole_text_with_overlap() {
        let text: String = std::iter::repeat('a').take(2500).collect();
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        // Final chunk starts at 1600 and runs to the end
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn bio_merge_joins_subwords() {
        let merged = merge_bio_entities(&[
            raw("B-PER", "Sa", 0.9),
            raw("I-PER", "##rah", 0.8),
            raw("I-PER", "Connor", 0.7),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].word, "Sarah Connor");
        assert!((merged[0].score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn bio_merge_discards_orphan_continuation() {
        let merged = merge_bio_entities(&[raw("I-PER", "orphan", 0.9), raw("B-ORG", "Acme", 0.9)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].word, "Acme");
    }

    #[test]
    fn bio_merge_category_mismatch_does_not_extend() {
        let merged = merge_bio_entities(&[raw("B-PER", "Sarah", 0.9), raw("I-ORG", "Acme", 0.9)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].word, "Sarah");
    }

    #[test]
    fn filter_drops_low_scores_and_unknown_categories() {
        let kept = filter_entities(
            vec![
                MergedEntity {
                    category: "PER".to_owned(),
                    word: "Sarah".to_owned(),
                    score: 0.9,
                },
                MergedEntity {
                    category: "PER".to_owned(),
                    word: "Bob".to_owned(),
                    score: 0.4,
                },
                MergedEntity {
                    category: "DATE".to_owned(),
                    word: "Tuesday".to_owned(),
                    score: 0.95,
                },
                // Duplicate across chunks collapses
                MergedEntity {
                    category: "PER".to_owned(),
                    word: "Sarah".to_owned(),
                    score: 0.85,
                },
            ],
            0.6,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, "Sarah");
        assert_eq!(kept[0].1, "PERSON");
    }

    #[test]
    fn apply_entities_replaces_all_occurrences() {
        let factory = PlaceholderFactory::default();
        let result = apply_entities(
            "Sarah met sarah at Acme",
            &[
                ("Sarah".to_owned(), "PERSON".to_owned(), 0.9),
                ("Acme".to_owned(), "ORG".to_owned(), 0.8),
            ],
            &factory,
        );
        assert_eq!(result.detections.len(), 3);
        assert!(!result.text.to_lowercase().contains("sarah"));
        assert!(!result.text.contains("Acme"));
        // Case-insensitive occurrences keep their original surface form
        assert_eq!(result.detections[1].value, "sarah");
    }

    #[test]
    fn overlapping_spans_keep_longest() {
        let factory = PlaceholderFactory::default();
        let result = apply_entities(
            "New York City is big",
            &[
                ("York".to_owned(), "LOCATION".to_owned(), 0.8),
                ("New York City".to_owned(), "LOCATION".to_owned(), 0.9),
            ],
            &factory,
        );
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].value, "New York City");
    }

    struct FailingFactory;

    #[async_trait]
    impl ClassifierFactory for FailingFactory {
        async fn load(&self, _model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
            Err(AppError::internal("model load failed"))
        }
    }

    struct CountingFactory {
        loads: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl ClassifierFactory for CountingFactory {
        async fn load(&self, _model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
            self.loads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(AppError::internal("still failing"))
        }
    }

    #[tokio::test]
    async fn failed_load_opens_circuit_and_passes_through() {
        let layer = NerLayer::new(Box::new(FailingFactory));
        let settings = RedactionSettings::default();
        let factory = PlaceholderFactory::default();
        let result = layer.redact("Sarah lives here", &settings, &factory).await;
        assert_eq!(result.text, "Sarah lives here");
        assert!(result.detections.is_empty());
    }

    #[tokio::test]
    async fn open_circuit_suppresses_reload_attempts() {
        let loads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let layer = NerLayer::new(Box::new(CountingFactory {
            loads: Arc::clone(&loads),
        }));
        let settings = RedactionSettings::default();
        let factory = PlaceholderFactory::default();
        layer.redact("one", &settings, &factory).await;
        layer.redact("two", &settings, &factory).await;
        layer.redact("three", &settings, &factory).await;
        // Only the first call attempts a load; the rest hit the open circuit
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    struct StaticClassifier(Vec<RawEntity>);

    #[async_trait]
    impl TokenClassifier for StaticClassifier {
        async fn classify(&self, _text: &str) -> AppResult<Vec<RawEntity>> {
            Ok(self.0.clone())
        }
    }

    struct StaticFactory(Vec<RawEntity>);

    #[async_trait]
    impl ClassifierFactory for StaticFactory {
        async fn load(&self, _model: &str) -> AppResult<Arc<dyn TokenClassifier>> {
            Ok(Arc::new(StaticClassifier(self.0.clone())))
        }
    }

    #[tokio::test]
    async fn end_to_end_redaction_with_static_model() {
        let layer = NerLayer::new(Box::new(StaticFactory(vec![
            raw("B-PER", "Sarah", 0.95),
            raw("B-ORG", "Ac", 0.9),
            raw("I-ORG", "##me", 0.8),
        ])));
        let settings = RedactionSettings::default();
        let factory = PlaceholderFactory::default();
        let result = layer
            .redact("Sarah works at Acme now", &settings, &factory)
            .await;
        assert_eq!(result.detections.len(), 2);
        assert!(!result.text.contains("Sarah"));
        assert!(!result.text.contains("Acme"));
        assert!(result.text.contains(" works at "));
        assert_eq!(result.tokens.len(), 2);
    }
}
