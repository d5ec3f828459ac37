// ABOUTME: Redaction sub-layer implementations orchestrated by the pipeline
// ABOUTME: Dictionary, NER and heuristic-name layers each emit detections and token bindings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Redaction layers
//!
//! Each layer consumes the text produced by its predecessor and contributes
//! detections plus placeholder bindings. The regex sub-layer lives in the
//! pipeline itself since it is a thin walk over the pattern catalogue.

pub mod dictionary;
pub mod names;
pub mod ner;

use crate::models::{PiiDetection, TokenBinding};

/// Output of one redaction sub-layer
#[derive(Debug, Clone, Default)]
pub struct LayerResult {
    /// Text after this layer's replacements
    pub text: String,
    /// Bindings minted by this layer
    pub tokens: Vec<TokenBinding>,
    /// Detections produced by this layer
    pub detections: Vec<PiiDetection>,
}

impl LayerResult {
    /// A pass-through result with no detections
    #[must_use]
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            tokens: Vec::new(),
            detections: Vec::new(),
        }
    }
}

/// Word-character test shared by boundary checks (alphanumeric or underscore)
#[must_use]
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
