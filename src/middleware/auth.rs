// ABOUTME: Bearer-token extraction and constant-time comparison for management endpoints
// ABOUTME: Accepts API_TOKEN (and optionally STATS_TOKEN) from the Authorization header
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Management authentication
//!
//! The management surface is guarded by a static bearer token. Comparison
//! always runs in constant time over the full token bytes so response
//! latency never reveals a prefix match.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppResult};

/// Extract the bearer token from an `Authorization` header
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Constant-time equality over token strings
#[must_use]
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    // Token length is not secret; only the byte comparison must be
    // constant-time.
    provided.len() == expected.len()
        && provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Require a bearer token matching `expected`
///
/// # Errors
///
/// Returns `AuthRequired` when the header is missing and `AuthInvalid` when
/// the token does not match.
pub fn require_token(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let Some(provided) = bearer_token(headers) else {
        return Err(AppError::auth_required());
    };
    if tokens_match(provided, expected) {
        Ok(())
    } else {
        Err(AppError::auth_invalid("invalid API token"))
    }
}

/// Require a bearer token matching any of the accepted tokens
///
/// # Errors
///
/// Returns `AuthRequired` when the header is missing and `AuthInvalid` when
/// no accepted token matches.
pub fn require_any_token(headers: &HeaderMap, accepted: &[&str]) -> AppResult<()> {
    let Some(provided) = bearer_token(headers) else {
        return Err(AppError::auth_required());
    };
    // Evaluate every candidate so the number of configured tokens does not
    // shape the timing.
    let mut matched = false;
    for expected in accepted {
        matched |= tokens_match(provided, expected);
    }
    if matched {
        Ok(())
    } else {
        Err(AppError::auth_invalid("invalid API token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with("Bearer secret123");
        assert_eq!(bearer_token(&headers), Some("secret123"));
    }

    #[test]
    fn missing_header_is_auth_required() {
        let err = require_token(&HeaderMap::new(), "secret").unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::AuthRequired);
    }

    #[test]
    fn wrong_token_is_auth_invalid() {
        let headers = headers_with("Bearer wrong");
        let err = require_token(&headers, "secret").unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::AuthInvalid);
    }

    #[test]
    fn matching_token_passes() {
        let headers = headers_with("Bearer secret");
        assert!(require_token(&headers, "secret").is_ok());
    }

    #[test]
    fn any_token_accepts_either() {
        let headers = headers_with("Bearer stats-token");
        assert!(require_any_token(&headers, &["api-token", "stats-token"]).is_ok());
        assert!(require_any_token(&headers, &["api-token"]).is_err());
    }

    #[test]
    fn comparison_rejects_prefixes() {
        assert!(!tokens_match("secret", "secret1"));
        assert!(!tokens_match("", "secret"));
        assert!(tokens_match("secret", "secret"));
    }
}
