// ABOUTME: Environment-driven server configuration for deployment-specific settings
// ABOUTME: Parses ports, tokens, database path, CORS origin and NER endpoint from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Environment-based configuration
//!
//! All runtime configuration arrives through environment variables;
//! `ServerConfig::from_env` is called once at startup and the result is
//! shared read-only. Redaction behavior itself lives in the settings store,
//! not here, so it can change without a restart.

use std::env;

use anyhow::{Context, Result};

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default durable store path
pub const DEFAULT_DB_PATH: &str = "./data/anonamoose.db";

/// Default NER inference endpoint
pub const DEFAULT_NER_ENDPOINT: &str = "http://127.0.0.1:8090";

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Default operational logging
    #[default]
    Info,
    /// Verbose diagnostics
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }

    /// The equivalent `tracing` filter directive
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    /// Listen port (proxy and management surfaces share it)
    pub port: u16,
    /// Bearer token guarding the management surface
    pub api_token: Option<String>,
    /// Optional read-only token accepted by the stats endpoints
    pub stats_token: Option<String>,
    /// Durable store path
    pub db_path: String,
    /// Allowed CORS origin; `None` means permissive
    pub cors_origin: Option<String>,
    /// Token-classification inference endpoint
    pub ner_endpoint: String,
    /// Model weight cache directory handed to the inference runtime
    pub ner_model_cache: Option<String>,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when `PORT` is present but not a valid port number.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid PORT value: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        // The management surface used to listen separately; both now share
        // PORT.
        if env::var("MGMT_PORT").is_ok() {
            tracing::warn!("MGMT_PORT is ignored; management endpoints share PORT");
        }

        let log_level = env::var("LOG_LEVEL")
            .map(|v| LogLevel::from_str_or_default(&v))
            .unwrap_or_default();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned()),
            port,
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            stats_token: env::var("STATS_TOKEN").ok().filter(|t| !t.is_empty()),
            db_path: env::var("ANONAMOOSE_DB_PATH")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.to_owned()),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty()),
            ner_endpoint: env::var("NER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_NER_ENDPOINT.to_owned()),
            ner_model_cache: env::var("NER_MODEL_CACHE").ok(),
            log_level,
            log_json: env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// One-line startup summary (never includes token values)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "listen={}:{} db={} auth={} stats_auth={} ner={}",
            self.host,
            self.port,
            self.db_path,
            if self.api_token.is_some() { "on" } else { "off" },
            if self.stats_token.is_some() { "on" } else { "off" },
            self.ner_endpoint,
        )
    }
}
