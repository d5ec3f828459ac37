// ABOUTME: Heuristic name detection from a given-name list and English word frequencies
// ABOUTME: Scores candidates by name/English membership, capitalization and word frequency
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Heuristic Name Layer
//!
//! Deterministic supplement to the NER layer. Candidates are word tokens of
//! three or more letters; each is scored against a static given-name set and
//! an English word-frequency table (SUBTLEX-style counts). The corpora ship
//! embedded under `data/` and load once per process; `NAMES_DATA_DIR` can
//! point at full-size replacements.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::layers::LayerResult;
use crate::models::{PiiDetection, RedactionLayer, TokenBinding};
use crate::tokenizer::PlaceholderFactory;

/// Frequency at or above which an English word counts as "common"
pub const DEFAULT_FREQUENCY_THRESHOLD: u64 = 10_000;

/// Category tag emitted for heuristic name detections
const CATEGORY: &str = "PERSON";

/// Static corpora backing the layer
struct NameCorpora {
    names: HashSet<String>,
    english: HashMap<String, u64>,
    excluded: HashSet<String>,
}

fn load_lines(embedded: &str, dir: Option<&str>, file: &str) -> String {
    if let Some(dir) = dir {
        let path = std::path::Path::new(dir).join(file);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            tracing::info!(path = %path.display(), "loaded name corpus override");
            return contents;
        }
    }
    embedded.to_owned()
}

fn corpora() -> &'static NameCorpora {
    static CORPORA: OnceLock<NameCorpora> = OnceLock::new();
    CORPORA.get_or_init(|| {
        let dir = std::env::var("NAMES_DATA_DIR").ok();
        let dir = dir.as_deref();

        let names = load_lines(include_str!("../../data/given_names.txt"), dir, "given_names.txt")
            .lines()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        let english = load_lines(
            include_str!("../../data/english_words.tsv"),
            dir,
            "english_words.tsv",
        )
        .lines()
        .filter_map(|l| {
            let (word, freq) = l.trim().split_once('\t')?;
            Some((word.to_lowercase(), freq.trim().parse().ok()?))
        })
        .collect();

        let excluded = load_lines(
            include_str!("../../data/excluded_words.txt"),
            dir,
            "excluded_words.txt",
        )
        .lines()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

        NameCorpora {
            names,
            english,
            excluded,
        }
    })
}

fn candidate_regex() -> &'static Regex {
    static CANDIDATE_RE: OnceLock<Regex> = OnceLock::new();
    CANDIDATE_RE.get_or_init(|| {
        // Hardcoded pattern, compile-checked by tests
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"\b[A-Za-z][A-Za-z']+\b").unwrap();
        re
    })
}

/// Score one candidate word; `None` means skip.
///
/// The grid below is keyed on name-list membership, English membership,
/// capitalization and frequency; unknown lowercase words and common
/// lowercase English words never score.
fn base_confidence(
    is_name: bool,
    is_english: bool,
    capitalized: bool,
    frequency: u64,
    threshold: u64,
) -> Option<f64> {
    match (is_name, is_english) {
        (true, false) => Some(if capitalized { 0.85 } else { 0.65 }),
        (true, true) => match (capitalized, frequency < threshold) {
            (true, true) => Some(0.70),
            (true, false) => Some(0.50),
            (false, true) => Some(0.45),
            (false, false) => None,
        },
        (false, false) => capitalized.then_some(0.70),
        (false, true) => None,
    }
}

/// Whether the candidate starts a sentence: it is the first word of the
/// text, or the previous non-whitespace character ends a sentence.
fn is_sentence_start(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .rev()
        .find(|c| !c.is_whitespace())
        .is_none_or(|c| matches!(c, '.' | '?' | '!'))
}

/// The heuristic name layer
pub struct NamesLayer {
    frequency_threshold: u64,
}

impl Default for NamesLayer {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_THRESHOLD)
    }
}

impl NamesLayer {
    /// Create a layer with the given common-word frequency threshold
    #[must_use]
    pub fn new(frequency_threshold: u64) -> Self {
        Self {
            frequency_threshold,
        }
    }

    /// Redact likely person names from `text`
    #[must_use]
    pub fn redact(&self, text: &str, factory: &PlaceholderFactory) -> LayerResult {
        let corpora = corpora();

        struct Candidate {
            start: usize,
            end: usize,
            confidence: f64,
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for m in candidate_regex().find_iter(text) {
            let word = m.as_str();
            if word.chars().count() < 3 {
                continue;
            }
            let lower = word.to_lowercase();
            if corpora.excluded.contains(&lower) {
                continue;
            }

            let is_name = corpora.names.contains(&lower);
            let frequency = corpora.english.get(&lower).copied();
            let is_english = frequency.is_some();
            let capitalized = word.chars().next().is_some_and(char::is_uppercase);

            let Some(mut confidence) = base_confidence(
                is_name,
                is_english,
                capitalized,
                frequency.unwrap_or(0),
                self.frequency_threshold,
            ) else {
                continue;
            };

            if is_sentence_start(text, m.start()) {
                if !is_name {
                    continue;
                }
                confidence -= if capitalized { 0.15 } else { 0.20 };
            }
            if confidence <= 0.0 {
                continue;
            }

            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                confidence,
            });
        }

        if candidates.is_empty() {
            return LayerResult::unchanged(text);
        }

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
                layer: RedactionLayer::Names,
                category: CATEGORY.to_owned(),
                meta: None,
            });
            detections.push(PiiDetection {
                layer: RedactionLayer::Names,
                category: CATEGORY.to_owned(),
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
}
