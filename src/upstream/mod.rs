// ABOUTME: Upstream LLM provider targets and the shared forwarding HTTP client
// ABOUTME: Preserves provider-specific headers and streams response bodies through
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Upstream Forwarding
//!
//! The proxy forwards rewritten request bodies to the real provider APIs and
//! returns their responses, streaming when the client asked for a stream.
//! One shared `reqwest` client carries a 60-second request timeout; client
//! disconnects propagate by dropping the in-flight response stream.

pub mod body;
pub mod sse;

use std::time::Duration;

use axum::http::HeaderMap;

use crate::errors::{AppError, AppResult};
use crate::observability::RedactionSource;

/// Upstream request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connect timeout to the provider
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// A supported chat-completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// `api.openai.com`
    OpenAi,
    /// `api.anthropic.com`
    Anthropic,
}

impl Provider {
    /// Provider API base URL
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Display name for logs and errors
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Source tag for the redaction log
    #[must_use]
    pub const fn redaction_source(self) -> RedactionSource {
        match self {
            Self::OpenAi => RedactionSource::Openai,
            Self::Anthropic => RedactionSource::Anthropic,
        }
    }
}

/// Request headers copied through to the provider
const FORWARDED_HEADERS: &[&str] = &[
    "authorization",
    "content-type",
    "accept",
    "anthropic-version",
    "anthropic-beta",
    "openai-organization",
    "openai-project",
    "x-api-key",
];

/// Shared forwarding client
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build the shared client with proxy-wide timeouts
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend fails to initialize.
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("upstream client build failed: {e}")))?;
        Ok(Self { client })
    }

    /// Forward a JSON body to `path` on the provider, copying the allowed
    /// headers from the client request.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` on connect/timeout failures and
    /// `UpstreamError` on other transport errors. Non-2xx provider statuses
    /// are NOT errors here; the caller forwards status and body through.
    pub async fn forward(
        &self,
        provider: Provider,
        path: &str,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}{path}", provider.base_url());
        let mut request = self.client.post(&url).body(body);
        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(*name) {
                request = request.header(*name, value.as_bytes());
            }
        }
        let response = request.send().await?;
        Ok(response)
    }

    /// Forward an arbitrary-method passthrough request (no body rewriting)
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the request cannot be sent.
    pub async fn passthrough(
        &self,
        provider: Provider,
        method: reqwest::Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}{path_and_query}", provider.base_url());
        let mut request = self.client.request(method, &url);
        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(*name) {
                request = request.header(*name, value.as_bytes());
            }
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        let response = request.send().await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_bases() {
        assert_eq!(Provider::OpenAi.base_url(), "https://api.openai.com");
        assert_eq!(Provider::Anthropic.base_url(), "https://api.anthropic.com");
    }

    #[test]
    fn redaction_sources_map() {
        assert_eq!(
            Provider::Anthropic.redaction_source(),
            RedactionSource::Anthropic
        );
    }
}
