// ABOUTME: Core data models shared across redaction layers, storage and HTTP surfaces
// ABOUTME: Defines detections, token bindings, sessions, dictionary entries and settings keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Common data models
//!
//! Wire-format types use camelCase field names to match the management API
//! and the admin UI; detection `layer` serializes as `type` on the wire.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// The redaction sub-layer that produced a detection or binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionLayer {
    /// Administrator-supplied term dictionary (guaranteed matches)
    Dictionary,
    /// Transformer-backed named entity recognition
    Ner,
    /// Regex pattern catalogue with checksum validators
    Regex,
    /// Heuristic name-list detection
    Names,
}

impl RedactionLayer {
    /// Stable lowercase tag used in storage and log output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Ner => "ner",
            Self::Regex => "regex",
            Self::Names => "names",
        }
    }
}

impl std::fmt::Display for RedactionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One PII match produced by a redaction layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiDetection {
    /// Originating layer
    #[serde(rename = "type")]
    pub layer: RedactionLayer,
    /// Category tag, e.g. `EMAIL`, `AU_TFN`, `PERSON`
    pub category: String,
    /// The original matched text
    pub value: String,
    /// Half-open character range start over the text at detection time
    pub start_index: usize,
    /// Half-open character range end
    pub end_index: usize,
    /// Confidence in (0, 1]
    pub confidence: f64,
}

/// A reversible placeholder → original mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBinding {
    /// Opaque placeholder, unique within a session
    pub placeholder: String,
    /// The redacted original value
    pub original: String,
    /// Layer that minted the binding
    pub layer: RedactionLayer,
    /// Category tag of the detection
    pub category: String,
    /// Optional free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,
}

/// The rehydration unit: all bindings accumulated for one logical conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 36-character lowercase-hex UUID with four hyphens
    pub session_id: String,
    /// Ordered list of bindings (insertion order preserved)
    pub tokens: Vec<TokenBinding>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp (always after `created_at`)
    pub expires_at: DateTime<Utc>,
    /// Last read or write timestamp
    pub last_accessed_at: DateTime<Utc>,
}

/// A guaranteed-redaction dictionary rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    /// Stable unique id
    pub id: String,
    /// Term to redact (non-empty, at most 1000 chars)
    pub term: String,
    /// Optional replacement label (informational; placeholders are minted regardless)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Whether matching requires exact case
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whether both match boundaries must be word boundaries
    #[serde(default)]
    pub whole_word: bool,
    /// Disabled entries are removed from the index and store
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

/// Regional tag selecting which country-specific regex patterns apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    /// Australia
    AU,
    /// New Zealand
    NZ,
    /// United Kingdom
    UK,
    /// United States
    US,
}

impl Locale {
    /// Parse a locale tag, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "AU" => Some(Self::AU),
            "NZ" => Some(Self::NZ),
            "UK" => Some(Self::UK),
            "US" => Some(Self::US),
            _ => None,
        }
    }

    /// Stable tag string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AU => "AU",
            Self::NZ => "NZ",
            Self::UK => "UK",
            Self::US => "US",
        }
    }
}

/// Canonical UUID shape accepted for session ids
fn session_id_regex() -> &'static Regex {
    static SESSION_ID_RE: OnceLock<Regex> = OnceLock::new();
    SESSION_ID_RE.get_or_init(|| {
        // Hardcoded pattern, compile-checked by tests
        #[allow(clippy::unwrap_used)]
        let re =
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap();
        re
    })
}

/// Check whether a session id matches the canonical lowercase UUID shape
#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    session_id.len() == 36 && session_id_regex().is_match(session_id)
}

/// Mint a fresh canonical session id
#[must_use]
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_session_ids_are_canonical() {
        for _ in 0..32 {
            assert!(is_valid_session_id(&new_session_id()));
        }
    }

    #[test]
    fn session_id_shape_rejections() {
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("not-a-uuid"));
        // Uppercase hex is not canonical
        assert!(!is_valid_session_id(
            "D8F3C2A1-0B4E-4F6A-9C1D-2E3F4A5B6C7D"
        ));
        // Wrong group lengths
        assert!(!is_valid_session_id(
            "d8f3c2a10-b4e-4f6a-9c1d-2e3f4a5b6c7d"
        ));
    }

    #[test]
    fn detection_serializes_layer_as_type() {
        let detection = PiiDetection {
            layer: RedactionLayer::Regex,
            category: "EMAIL".to_owned(),
            value: "a@b.co".to_owned(),
            start_index: 0,
            end_index: 6,
            confidence: 0.95,
        };
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["type"], "regex");
        assert_eq!(json["startIndex"], 0);
        assert_eq!(json["endIndex"], 6);
    }
}
