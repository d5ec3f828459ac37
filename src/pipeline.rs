// ABOUTME: Redaction pipeline orchestrating dictionary, NER, regex and name layers in fixed order
// ABOUTME: Accumulates tokens across layers and deduplicates NER/name detections
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Redaction Pipeline
//!
//! Executes the four sub-layers in fixed order: Dictionary, NER, Regex,
//! Names. Each layer receives the text produced by its predecessor;
//! placeholders already minted are inert to later layers because they
//! contain only Private-Use-Area characters. With `tokenizePlaceholders`
//! disabled the pipeline runs in pure analysis mode: every layer sees the
//! original text and only detections are reported.

use std::collections::HashSet;
use std::sync::Arc;

use crate::layers::dictionary::DictionaryLayer;
use crate::layers::names::NamesLayer;
use crate::layers::ner::NerLayer;
use crate::layers::LayerResult;
use crate::models::{PiiDetection, RedactionLayer, TokenBinding};
use crate::patterns::catalogue_for_locale;
use crate::settings::RedactionSettings;
use crate::tokenizer::PlaceholderFactory;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    /// Rewritten text (the input text in analysis mode)
    pub redacted_text: String,
    /// Union of all sub-layer bindings
    pub tokens: Vec<TokenBinding>,
    /// All detections, each tagged with its originating layer
    pub detections: Vec<PiiDetection>,
}

impl RedactionOutcome {
    /// Whether any layer produced a detection
    #[must_use]
    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty()
    }
}

/// The four-layer redaction pipeline
pub struct RedactionPipeline {
    dictionary: Arc<DictionaryLayer>,
    ner: Arc<NerLayer>,
    names: NamesLayer,
}

impl RedactionPipeline {
    /// Assemble the pipeline from its layers
    #[must_use]
    pub fn new(dictionary: Arc<DictionaryLayer>, ner: Arc<NerLayer>) -> Self {
        Self {
            dictionary,
            ner,
            names: NamesLayer::default(),
        }
    }

    /// Run the enabled layers over `text` under a settings snapshot
    pub async fn redact(&self, text: &str, settings: &RedactionSettings) -> RedactionOutcome {
        let factory =
            PlaceholderFactory::new(&settings.placeholder_prefix, &settings.placeholder_suffix);
        let tokenize = settings.tokenize_placeholders;

        let mut current = text.to_owned();
        let mut tokens: Vec<TokenBinding> = Vec::new();
        let mut detections: Vec<PiiDetection> = Vec::new();
        // (value, category) pairs already accepted; used to suppress
        // duplicate NER and name detections
        let mut accepted: HashSet<(String, String)> = HashSet::new();

        if settings.enable_dictionary {
            let result = self.dictionary.redact(&current, &factory);
            absorb(result, tokenize, false, &mut current, &mut tokens, &mut detections, &mut accepted);
        }

        if settings.enable_ner {
            let result = self.ner.redact(&current, settings, &factory).await;
            absorb(result, tokenize, true, &mut current, &mut tokens, &mut detections, &mut accepted);
        }

        if settings.enable_regex {
            let result = regex_redact(&current, settings, &factory);
            absorb(result, tokenize, false, &mut current, &mut tokens, &mut detections, &mut accepted);
        }

        if settings.enable_names {
            let result = self.names.redact(&current, &factory);
            absorb(result, tokenize, true, &mut current, &mut tokens, &mut detections, &mut accepted);
        }

        RedactionOutcome {
            redacted_text: if tokenize { current } else { text.to_owned() },
            tokens,
            detections,
        }
    }
}

/// Fold one layer's result into the running pipeline state
fn absorb(
    result: LayerResult,
    tokenize: bool,
    dedup: bool,
    current: &mut String,
    tokens: &mut Vec<TokenBinding>,
    detections: &mut Vec<PiiDetection>,
    accepted: &mut HashSet<(String, String)>,
) {
    if tokenize {
        *current = result.text;
        tokens.extend(result.tokens);
    }
    for detection in result.detections {
        let pair = (detection.value.clone(), detection.category.clone());
        if dedup && accepted.contains(&pair) {
            continue;
        }
        accepted.insert(pair);
        detections.push(detection);
    }
}

/// Regex sub-layer: scan the locale-filtered catalogue, apply validators,
/// and replace matches right-to-left by index range.
fn regex_redact(text: &str, settings: &RedactionSettings, factory: &PlaceholderFactory) -> LayerResult {
    struct Candidate {
        start: usize,
        end: usize,
        name: &'static str,
        confidence: f64,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for pattern in catalogue_for_locale(settings.locale) {
        for m in pattern.regex.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            if let Some(validator) = pattern.validator {
                if !validator(m.as_str()) {
                    continue;
                }
            }
            let overlaps = candidates
                .iter()
                .any(|c| m.start() < c.end && c.start < m.end());
            if overlaps {
                continue;
            }
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                name: pattern.name,
                confidence: pattern.confidence,
            });
        }
    }

    if candidates.is_empty() {
        return LayerResult::unchanged(text);
    }
    candidates.sort_by_key(|c| c.start);

    let mut result = text.to_owned();
    let mut tokens = Vec::with_capacity(candidates.len());
    let mut detections = Vec::with_capacity(candidates.len());
    for c in candidates.iter().rev() {
        let value = text[c.start..c.end].to_owned();
        let placeholder = factory.mint();
        result.replace_range(c.start..c.end, &placeholder);
        tokens.push(TokenBinding {
            placeholder: placeholder.clone(),
            original: value.clone(),
            layer: RedactionLayer::Regex,
            category: c.name.to_owned(),
            meta: None,
        });
        detections.push(PiiDetection {
            layer: RedactionLayer::Regex,
            category: c.name.to_owned(),
            value,
            start_index: text[..c.start].chars().count(),
            end_index: text[..c.end].chars().count(),
            confidence: c.confidence,
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
