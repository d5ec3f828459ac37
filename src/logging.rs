// ABOUTME: Structured logging initialization over tracing-subscriber
// ABOUTME: Honors RUST_LOG when set, else the configured level; JSON format optional
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Production logging setup

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG`, when set, wins over the configured level so operators can
/// raise verbosity per module without touching configuration.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init(config: &ServerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }
    Ok(())
}
