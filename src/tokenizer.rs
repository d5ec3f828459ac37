// ABOUTME: Placeholder minting and value-to-placeholder substitution primitives
// ABOUTME: Placeholders are Private-Use-Area delimited 16-hex-char opaque tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Placeholder Tokenizer
//!
//! Mints unique opaque placeholders of the form `prefix + 16-hex-id + suffix`.
//! The delimiters default to Unicode Private-Use-Area characters (U+E000 and
//! U+E001): language models treat them as opaque, they never occur in natural
//! text, and they cannot be confused with content syntax. The id is the first
//! 16 hex digits of a UUID v4, giving at least 64 bits of entropy; collisions
//! within a session are treated as impossible.

use std::collections::HashMap;

use regex::Regex;
use uuid::Uuid;

/// Default placeholder prefix (Private Use Area)
pub const DEFAULT_PREFIX: char = '\u{E000}';

/// Default placeholder suffix (Private Use Area)
pub const DEFAULT_SUFFIX: char = '\u{E001}';

/// Mints placeholders with configurable delimiters
#[derive(Debug, Clone)]
pub struct PlaceholderFactory {
    prefix: String,
    suffix: String,
}

impl Default for PlaceholderFactory {
    fn default() -> Self {
        Self::new(&DEFAULT_PREFIX.to_string(), &DEFAULT_SUFFIX.to_string())
    }
}

impl PlaceholderFactory {
    /// Create a factory with the given delimiter strings
    #[must_use]
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
        }
    }

    /// Mint a fresh placeholder: `prefix + 16 hex chars + suffix`
    #[must_use]
    pub fn mint(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}{}{}", self.prefix, &id[..16], self.suffix)
    }

    /// The configured prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The configured suffix
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

/// Replace each original value in `text` with its placeholder.
///
/// Regex metacharacters in the values are escaped, so values are matched as
/// literals. Used by the dictionary layer's final emission; other layers
/// replace by index range.
#[must_use]
pub fn tokenize(text: &str, bindings: &HashMap<String, String>) -> String {
    let mut result = text.to_owned();
    for (placeholder, original) in bindings {
        if original.is_empty() {
            continue;
        }
        let escaped = regex::escape(original);
        if let Ok(re) = Regex::new(&escaped) {
            result = re.replace_all(&result, placeholder.as_str()).into_owned();
        }
    }
    result
}
