// ABOUTME: Live-read configuration service over the settings table with typed snapshots
// ABOUTME: Every redaction call takes a fresh snapshot so changes apply without restart
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Settings Store
//!
//! Key/value configuration backed by durable storage. Recognized keys gate
//! the redaction layers and shape the tokenizer; unknown keys are stored
//! verbatim as opaque values. A [`RedactionSettings`] snapshot is read fresh
//! at the start of each redaction call and passed by reference through the
//! pipeline, which is what makes live reconfiguration safe.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::Locale;
use crate::tokenizer::{DEFAULT_PREFIX, DEFAULT_SUFFIX};

/// Default NER model identifier
pub const DEFAULT_NER_MODEL: &str = "Xenova/bert-base-NER";

/// Default NER confidence floor
pub const DEFAULT_NER_MIN_CONFIDENCE: f64 = 0.6;

/// Typed snapshot of the recognized settings
#[derive(Debug, Clone)]
pub struct RedactionSettings {
    /// Gate for the dictionary layer
    pub enable_dictionary: bool,
    /// Gate for the NER layer
    pub enable_ner: bool,
    /// Gate for the regex sub-layer
    pub enable_regex: bool,
    /// Gate for the heuristic name layer
    pub enable_names: bool,
    /// Model identifier passed to the NER layer
    pub ner_model: String,
    /// Confidence floor for NER entities
    pub ner_min_confidence: f64,
    /// Regex locale filter; `None` applies every pattern
    pub locale: Option<Locale>,
    /// When false, detections are reported but no placeholders are minted
    pub tokenize_placeholders: bool,
    /// Placeholder prefix characters
    pub placeholder_prefix: String,
    /// Placeholder suffix characters
    pub placeholder_suffix: String,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            enable_dictionary: true,
            enable_ner: true,
            enable_regex: true,
            enable_names: true,
            ner_model: DEFAULT_NER_MODEL.to_owned(),
            ner_min_confidence: DEFAULT_NER_MIN_CONFIDENCE,
            locale: None,
            tokenize_placeholders: true,
            placeholder_prefix: DEFAULT_PREFIX.to_string(),
            placeholder_suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

/// The recognized keys, in presentation order
pub const RECOGNIZED_KEYS: &[&str] = &[
    "enableDictionary",
    "enableNER",
    "enableRegex",
    "enableNames",
    "nerModel",
    "nerMinConfidence",
    "locale",
    "tokenizePlaceholders",
    "placeholderPrefix",
    "placeholderSuffix",
];

/// Durable settings store
pub struct SettingsStore {
    database: Arc<Database>,
}

impl SettingsStore {
    /// Create the store over the shared database handle
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Default values for every recognized key
    #[must_use]
    pub fn defaults() -> BTreeMap<String, Value> {
        let d = RedactionSettings::default();
        let mut map = BTreeMap::new();
        map.insert("enableDictionary".to_owned(), json!(d.enable_dictionary));
        map.insert("enableNER".to_owned(), json!(d.enable_ner));
        map.insert("enableRegex".to_owned(), json!(d.enable_regex));
        map.insert("enableNames".to_owned(), json!(d.enable_names));
        map.insert("nerModel".to_owned(), json!(d.ner_model));
        map.insert("nerMinConfidence".to_owned(), json!(d.ner_min_confidence));
        map.insert("locale".to_owned(), Value::Null);
        map.insert(
            "tokenizePlaceholders".to_owned(),
            json!(d.tokenize_placeholders),
        );
        map.insert("placeholderPrefix".to_owned(), json!(d.placeholder_prefix));
        map.insert("placeholderSuffix".to_owned(), json!(d.placeholder_suffix));
        map
    }

    /// All effective settings: defaults overlaid with stored values
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn all(&self) -> AppResult<BTreeMap<String, Value>> {
        let mut map = Self::defaults();
        for (key, value) in self.database.all_settings().await? {
            map.insert(key, value);
        }
        Ok(map)
    }

    /// One effective setting value; `None` for an unknown, unset key
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        if let Some(value) = self.database.get_setting(key).await? {
            return Ok(Some(value));
        }
        Ok(Self::defaults().get(key).cloned())
    }

    /// Apply a partial update; only provided keys change.
    ///
    /// Returns the keys that were written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when a recognized key carries a value of the
    /// wrong shape, or a database error.
    pub async fn update(&self, changes: &BTreeMap<String, Value>) -> AppResult<Vec<String>> {
        let mut written = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            validate(key, value)?;
            self.database.set_setting(key, value).await?;
            written.push(key.clone());
        }
        Ok(written)
    }

    /// Read a fresh typed snapshot of the recognized settings
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn snapshot(&self) -> AppResult<RedactionSettings> {
        let all = self.all().await?;
        let mut snapshot = RedactionSettings::default();

        let flag = |key: &str, fallback: bool| {
            all.get(key).and_then(Value::as_bool).unwrap_or(fallback)
        };
        snapshot.enable_dictionary = flag("enableDictionary", true);
        snapshot.enable_ner = flag("enableNER", true);
        snapshot.enable_regex = flag("enableRegex", true);
        snapshot.enable_names = flag("enableNames", true);
        snapshot.tokenize_placeholders = flag("tokenizePlaceholders", true);

        if let Some(model) = all.get("nerModel").and_then(Value::as_str) {
            snapshot.ner_model = model.to_owned();
        }
        if let Some(confidence) = all.get("nerMinConfidence").and_then(Value::as_f64) {
            snapshot.ner_min_confidence = confidence;
        }
        snapshot.locale = all
            .get("locale")
            .and_then(Value::as_str)
            .and_then(Locale::parse);
        if let Some(prefix) = all.get("placeholderPrefix").and_then(Value::as_str) {
            if !prefix.is_empty() {
                snapshot.placeholder_prefix = prefix.to_owned();
            }
        }
        if let Some(suffix) = all.get("placeholderSuffix").and_then(Value::as_str) {
            if !suffix.is_empty() {
                snapshot.placeholder_suffix = suffix.to_owned();
            }
        }

        Ok(snapshot)
    }
}

/// Shape-check a recognized key's value; unknown keys pass through
fn validate(key: &str, value: &Value) -> AppResult<()> {
    let ok = match key {
        "enableDictionary" | "enableNER" | "enableRegex" | "enableNames"
        | "tokenizePlaceholders" => value.is_boolean(),
        "nerModel" | "placeholderPrefix" | "placeholderSuffix" => {
            value.as_str().is_some_and(|s| !s.is_empty())
        }
        "nerMinConfidence" => value
            .as_f64()
            .is_some_and(|c| (0.0..=1.0).contains(&c)),
        "locale" => {
            value.is_null() || value.as_str().is_some_and(|s| Locale::parse(s).is_some())
        }
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "invalid value for setting {key}"
        )))
    }
}
