// ABOUTME: Library entry point for the anonamoose PII-redacting LLM proxy
// ABOUTME: Exposes the redaction pipeline, rehydration store and HTTP surfaces
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

#![deny(unsafe_code)]

//! # Anonamoose
//!
//! A PII-redacting interception proxy for LLM chat-completion APIs. The
//! proxy sits between an application and OpenAI/Anthropic, strips
//! personally-identifiable information from outbound prompts through a
//! four-layer pipeline (dictionary, NER, regex with checksum validators,
//! heuristic names), forwards only sanitized content, and substitutes the
//! original values back into model output — including Server-Sent-Event
//! streams — on the way back. The same primitives are exposed directly
//! under `/api/v1`.
//!
//! ## Architecture
//!
//! - **pipeline** orchestrates the redaction **layers** over the
//!   **patterns** catalogue, minting placeholders via **tokenizer**
//! - **rehydration** persists `placeholder -> original` sessions in the
//!   embedded **database** with TTL sweeping
//! - **routes** + **upstream** implement the interception server: body
//!   rewriting, forwarding, and streaming hydration
//! - **settings** is read fresh on every redaction, so reconfiguration
//!   never needs a restart

/// Environment-driven server configuration
pub mod config;

/// Embedded SQLite storage for sessions, settings and the dictionary
pub mod database;

/// Unified error handling with HTTP response mapping
pub mod errors;

/// Redaction layers: dictionary, NER, heuristic names
pub mod layers;

/// Structured logging setup
pub mod logging;

/// HTTP middleware (management bearer auth)
pub mod middleware;

/// Core data models
pub mod models;

/// In-memory observability rings and counters
pub mod observability;

/// Declarative PII pattern catalogue with checksum validators
pub mod patterns;

/// The four-layer redaction pipeline
pub mod pipeline;

/// Per-source-address rate limiting
pub mod rate_limiting;

/// Durable session store with TTL management
pub mod rehydration;

/// HTTP routes: proxy, direct redaction and management surfaces
pub mod routes;

/// Bounded in-memory per-session hydration maps
pub mod session_map;

/// Live-read settings store
pub mod settings;

/// Placeholder minting and substitution
pub mod tokenizer;

/// Upstream forwarding, body rewriting and SSE hydration
pub mod upstream;
