// ABOUTME: Declarative immutable catalogue of PII regex patterns with locale filtering
// ABOUTME: Each entry couples a compiled regex with an optional checksum validator and confidence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Pattern Catalogue
//!
//! A process-wide, read-only table of PII patterns compiled once at first
//! use. Patterns without a `countries` tag are universal; tagged patterns are
//! applied only when the active locale is absent (null) or contained in the
//! tag set. A match whose validator returns false is discarded as if the
//! pattern had not matched.

pub mod validators;

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Locale;

/// A single catalogue entry
pub struct RegexPattern {
    /// Stable unique id
    pub id: &'static str,
    /// Category tag emitted in detections
    pub name: &'static str,
    /// Compiled global pattern
    pub regex: Regex,
    /// Optional predicate on the matched substring
    pub validator: Option<fn(&str) -> bool>,
    /// Confidence in (0, 1]
    pub confidence: f64,
    /// Country tag set; `None` means universal
    pub countries: Option<&'static [Locale]>,
}

impl RegexPattern {
    /// Whether this pattern applies under the given locale setting
    #[must_use]
    pub fn applies_to(&self, locale: Option<Locale>) -> bool {
        match (self.countries, locale) {
            (None, _) | (Some(_), None) => true,
            (Some(countries), Some(locale)) => countries.contains(&locale),
        }
    }
}

/// Declarative source row for the catalogue table
struct PatternDef {
    id: &'static str,
    name: &'static str,
    pattern: &'static str,
    validator: Option<fn(&str) -> bool>,
    confidence: f64,
    countries: Option<&'static [Locale]>,
}

const AU: &[Locale] = &[Locale::AU];
const NZ: &[Locale] = &[Locale::NZ];
const UK: &[Locale] = &[Locale::UK];
const US: &[Locale] = &[Locale::US];
const AU_NZ: &[Locale] = &[Locale::AU, Locale::NZ];

/// Street-type suffix alternation shared by the address heuristics
const STREET_TYPES: &str = "street|st|road|rd|avenue|ave|drive|dr|court|ct|place|pl|parade|pde|crescent|cres|boulevard|blvd|lane|ln|terrace|tce|way|highway|hwy|circuit|cct|close|cl";

fn defs() -> Vec<PatternDef> {
    vec![
        // ── Universal patterns ──────────────────────────────────────────
        PatternDef {
            id: "email",
            name: "EMAIL",
            pattern: r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
            validator: None,
            confidence: 0.95,
            countries: None,
        },
        PatternDef {
            id: "ipv4",
            name: "IP_ADDRESS",
            pattern: r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            validator: Some(validators::ipv4_octets),
            confidence: 0.9,
            countries: None,
        },
        PatternDef {
            id: "ipv6",
            name: "IPV6_ADDRESS",
            pattern: r"\b(?:[0-9A-Fa-f]{0,4}:){2,7}[0-9A-Fa-f]{0,4}\b",
            validator: Some(validators::ipv6),
            confidence: 0.85,
            countries: None,
        },
        PatternDef {
            id: "url",
            name: "URL",
            pattern: r#"\bhttps?://[^\s<>"']+"#,
            validator: None,
            confidence: 0.9,
            countries: None,
        },
        PatternDef {
            id: "mac_address",
            name: "MAC_ADDRESS",
            pattern: r"\b[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}\b",
            validator: None,
            confidence: 0.9,
            countries: None,
        },
        PatternDef {
            id: "iban",
            name: "IBAN",
            pattern: r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,3})?\b",
            validator: Some(validators::iban),
            confidence: 0.9,
            countries: None,
        },
        PatternDef {
            id: "credit_card",
            name: "CREDIT_CARD",
            pattern: r"\b\d(?:[ -]?\d){12,18}\b",
            validator: Some(validators::luhn),
            confidence: 0.9,
            countries: None,
        },
        PatternDef {
            id: "vin",
            name: "VIN",
            pattern: r"\b[A-HJ-NPR-Za-hj-npr-z0-9]{17}\b",
            validator: Some(validators::vin),
            confidence: 0.85,
            countries: None,
        },
        PatternDef {
            id: "medical_record_number",
            name: "MEDICAL_RECORD_NUMBER",
            pattern: r"(?i)\b(?:MRN|Medical Record(?: Number)?|Patient[ -]?ID|Unit Record)\s*[:#-]?\s*[A-Za-z0-9][A-Za-z0-9-]{2,}",
            validator: None,
            confidence: 0.8,
            countries: None,
        },
        PatternDef {
            id: "certificate_number",
            name: "CERTIFICATE_NUMBER",
            pattern: r"(?i)\b(?:certificate|cert|licen[cs]e)\s*(?:no|number|num)?\s*[:#-]\s*[A-Za-z0-9][A-Za-z0-9-]{3,}",
            validator: None,
            confidence: 0.75,
            countries: None,
        },
        // ── Australia ───────────────────────────────────────────────────
        PatternDef {
            id: "au_tfn",
            name: "AU_TFN",
            pattern: r"\b\d{3}[ -]?\d{3}[ -]?\d{3}\b",
            validator: Some(validators::au_tfn),
            confidence: 0.9,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_medicare",
            name: "AU_MEDICARE",
            pattern: r"\b[2-6]\d{3}[ -]?\d{5}[ -]?\d\b",
            validator: Some(validators::au_medicare),
            confidence: 0.9,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_abn",
            name: "AU_ABN",
            pattern: r"\b\d{2}[ -]?\d{3}[ -]?\d{3}[ -]?\d{3}\b",
            validator: Some(validators::au_abn),
            confidence: 0.9,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_passport",
            name: "AU_PASSPORT",
            pattern: r"\b[A-Za-z]{1,2}\d{7}\b",
            validator: None,
            confidence: 0.7,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_bsb_account",
            name: "AU_BANK_ACCOUNT",
            pattern: r"\b\d{3}-\d{3}[ ]?\d{6,10}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_address",
            name: "AU_ADDRESS",
            pattern: concat_address(),
            validator: None,
            confidence: 0.65,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_dob",
            name: "AU_DOB",
            pattern: r"(?i)\b(?:dob|date of birth|born)\s*[:\-]?\s*\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}\b",
            validator: None,
            confidence: 0.8,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_landline",
            name: "AU_PHONE",
            pattern: r"\b(?:\+?61[ -]?[2378]|\(0[2378]\)|0[2378])[ -]?\d{4}[ -]?\d{4}\b",
            validator: None,
            confidence: 0.75,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_mobile",
            name: "AU_MOBILE",
            pattern: r"\b(?:\+?61[ -]?4\d{2}|04\d{2})[ -]?\d{3}[ -]?\d{3}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(AU),
        },
        PatternDef {
            id: "au_nz_postcode",
            name: "POSTCODE",
            pattern: r"(?i)\b(?:postcode|post code)\s*[:\-]?\s*\d{4}\b",
            validator: None,
            confidence: 0.8,
            countries: Some(AU_NZ),
        },
        // ── New Zealand ─────────────────────────────────────────────────
        PatternDef {
            id: "nz_ird",
            name: "NZ_IRD",
            pattern: r"\b\d{2,3}[ -]\d{3}[ -]\d{3}\b",
            validator: Some(validators::nz_ird),
            confidence: 0.85,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_nhi",
            name: "NZ_NHI",
            pattern: r"\b[A-HJ-NP-Za-hj-np-z]{3}\d{4}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_passport",
            name: "NZ_PASSPORT",
            pattern: r"\b[Ll][A-Za-z]?\d{6}\b",
            validator: None,
            confidence: 0.6,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_bank_account",
            name: "NZ_BANK_ACCOUNT",
            pattern: r"\b\d{2}-\d{4}-\d{7}-\d{2,3}\b",
            validator: None,
            confidence: 0.9,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_landline",
            name: "NZ_PHONE",
            pattern: r"\b(?:\+?64[ -]?[34679]|0[34679])[ -]?\d{3}[ -]?\d{4}\b",
            validator: None,
            confidence: 0.75,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_mobile",
            name: "NZ_MOBILE",
            pattern: r"\b(?:\+?64[ -]?2\d|02\d)[ -]?\d{3}[ -]?\d{3,5}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_address",
            name: "NZ_ADDRESS",
            pattern: concat_address(),
            validator: None,
            confidence: 0.65,
            countries: Some(NZ),
        },
        PatternDef {
            id: "nz_dob",
            name: "NZ_DOB",
            pattern: r"(?i)\b(?:dob|date of birth|born)\s*[:\-]?\s*\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}\b",
            validator: None,
            confidence: 0.8,
            countries: Some(NZ),
        },
        // ── United Kingdom ──────────────────────────────────────────────
        PatternDef {
            id: "uk_nino",
            name: "UK_NINO",
            pattern: r"\b[ABCEGHJ-PRSTW-Zabceghj-prstw-z][ABCEGHJ-NPRSTW-Zabceghj-nprstw-z][ ]?\d{2}[ ]?\d{2}[ ]?\d{2}[ ]?[A-Da-d]\b",
            validator: None,
            confidence: 0.9,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_nhs",
            name: "UK_NHS",
            pattern: r"\b\d{3}[ -]?\d{3}[ -]?\d{4}\b",
            validator: Some(validators::uk_nhs),
            confidence: 0.9,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_passport",
            name: "UK_PASSPORT",
            pattern: r"\b\d{9}\b",
            validator: None,
            confidence: 0.5,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_driving_licence",
            name: "UK_DRIVING_LICENCE",
            pattern: r"\b[A-Za-z9]{5}\d{6}[A-Za-z9]{2}\d[A-Za-z]{2}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_sort_code",
            name: "UK_SORT_CODE",
            pattern: r"\b\d{2}-\d{2}-\d{2}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_postcode",
            name: "UK_POSTCODE",
            pattern: r"\b[A-Za-z]{1,2}\d[A-Za-z\d]?\s?\d[A-Za-z]{2}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_address",
            name: "UK_ADDRESS",
            pattern: concat_address(),
            validator: None,
            confidence: 0.65,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_dob",
            name: "UK_DOB",
            pattern: r"(?i)\b(?:dob|date of birth|born)\s*[:\-]?\s*\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}\b",
            validator: None,
            confidence: 0.8,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_landline",
            name: "UK_PHONE",
            pattern: r"\b(?:\+?44[ -]?|0)(?:1\d{2,3}|2\d)[ -]?\d{3,4}[ -]?\d{4}\b",
            validator: None,
            confidence: 0.75,
            countries: Some(UK),
        },
        PatternDef {
            id: "uk_mobile",
            name: "UK_MOBILE",
            pattern: r"\b(?:\+?44[ -]?7\d{3}|07\d{3})[ -]?\d{3}[ -]?\d{3}\b",
            validator: None,
            confidence: 0.85,
            countries: Some(UK),
        },
        // ── United States ───────────────────────────────────────────────
        PatternDef {
            id: "us_phone",
            name: "US_PHONE",
            pattern: r"\b(?:\+?1[ -.]?)?\d{3}[ -.]?\d{3}[ -.]?\d{4}\b|\(\d{3}\)[ -.]?\d{3}[ -.]?\d{4}\b",
            validator: None,
            confidence: 0.75,
            countries: Some(US),
        },
        PatternDef {
            id: "us_ssn",
            name: "US_SSN",
            pattern: r"\b\d{3}-\d{2}-\d{4}\b",
            validator: None,
            confidence: 0.9,
            countries: Some(US),
        },
    ]
}

/// Shared street-address heuristic (number + name + street-type suffix)
fn concat_address() -> &'static str {
    static ADDRESS: OnceLock<String> = OnceLock::new();
    ADDRESS
        .get_or_init(|| {
            format!(r"(?i)\b\d+[a-z]?(?:/\d+)?\s+[A-Za-z][A-Za-z' ]{{0,30}}\b(?:{STREET_TYPES})\b")
        })
        .as_str()
}

/// The compiled process-wide catalogue
#[must_use]
pub fn catalogue() -> &'static [RegexPattern] {
    static CATALOGUE: OnceLock<Vec<RegexPattern>> = OnceLock::new();
    CATALOGUE.get_or_init(|| {
        defs()
            .into_iter()
            .filter_map(|def| match Regex::new(def.pattern) {
                Ok(regex) => Some(RegexPattern {
                    id: def.id,
                    name: def.name,
                    regex,
                    validator: def.validator,
                    confidence: def.confidence,
                    countries: def.countries,
                }),
                Err(e) => {
                    // Patterns are compile-time constants; a failure here is a
                    // programming error caught by the catalogue tests.
                    tracing::error!("pattern {} failed to compile: {e}", def.id);
                    None
                }
            })
            .collect()
    })
}

/// Catalogue entries applicable under the given locale setting
pub fn catalogue_for_locale(locale: Option<Locale>) -> impl Iterator<Item = &'static RegexPattern> {
    catalogue().iter().filter(move |p| p.applies_to(locale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(catalogue().len(), defs().len());
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<&str> = catalogue().iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalogue().len());
    }

    #[test]
    fn confidences_in_range() {
        for p in catalogue() {
            assert!(p.confidence > 0.0 && p.confidence <= 1.0, "{}", p.id);
        }
    }

    #[test]
    fn locale_filtering() {
        let all = catalogue().len();
        let au: Vec<_> = catalogue_for_locale(Some(Locale::AU)).collect();
        assert!(au.len() < all);
        assert!(au.iter().all(|p| p.applies_to(Some(Locale::AU))));
        // Null locale applies every pattern
        assert_eq!(catalogue_for_locale(None).count(), all);
        // AU locale excludes NZ-only patterns but keeps the shared postcode
        assert!(au.iter().any(|p| p.id == "au_nz_postcode"));
        assert!(!au.iter().any(|p| p.id == "nz_ird"));
    }

    #[test]
    fn email_pattern_matches() {
        let p = catalogue().iter().find(|p| p.id == "email").unwrap();
        let m = p.regex.find("Email me at sarah.j@company.co.nz").unwrap();
        assert_eq!(m.as_str(), "sarah.j@company.co.nz");
    }

    #[test]
    fn credit_card_requires_luhn() {
        let p = catalogue().iter().find(|p| p.id == "credit_card").unwrap();
        let valid = "4532 0151 1283 0366";
        let invalid = "4532 0151 1283 0367";
        assert!(p.regex.is_match(valid));
        assert!((p.validator.unwrap())(valid));
        assert!(p.regex.is_match(invalid));
        assert!(!(p.validator.unwrap())(invalid));
    }

    #[test]
    fn uk_nino_shape() {
        let p = catalogue().iter().find(|p| p.id == "uk_nino").unwrap();
        assert!(p.regex.is_match("NI number AB 12 34 56 C"));
    }

    #[test]
    fn nz_nhi_shape() {
        let p = catalogue().iter().find(|p| p.id == "nz_nhi").unwrap();
        assert!(p.regex.is_match("NHI: ABC1234"));
        // I and O are excluded from the letter alphabet
        assert!(!p.regex.is_match("AIO1234"));
    }

    #[test]
    fn address_heuristic() {
        let p = catalogue().iter().find(|p| p.id == "au_address").unwrap();
        let m = p.regex.find("lives at 42 Wallaby Way Street").unwrap();
        assert!(m.as_str().starts_with("42 "));
    }
}
