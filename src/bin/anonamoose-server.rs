// ABOUTME: Server binary: configuration, bootstrap, background sweepers and graceful shutdown
// ABOUTME: Exits non-zero on unrecoverable startup failure (port in use, database unopenable)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

#![deny(unsafe_code)]

//! # Anonamoose Server Binary
//!
//! Starts the PII-redacting interception proxy: opens the durable store,
//! loads the dictionary index, wires the pipeline and HTTP surfaces, and
//! runs until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use anonamoose::config::ServerConfig;
use anonamoose::database::Database;
use anonamoose::layers::dictionary::DictionaryLayer;
use anonamoose::layers::ner::{HttpClassifierFactory, NerLayer};
use anonamoose::logging;
use anonamoose::observability::ObservabilityRing;
use anonamoose::pipeline::RedactionPipeline;
use anonamoose::rate_limiting::RateLimiter;
use anonamoose::rehydration::RehydrationStore;
use anonamoose::routes::{router, ServerResources};
use anonamoose::session_map::SessionTokenMap;
use anonamoose::settings::SettingsStore;
use anonamoose::upstream::UpstreamClient;

#[derive(Parser)]
#[command(name = "anonamoose-server")]
#[command(about = "PII-redacting interception proxy for LLM chat-completion APIs")]
struct Args {
    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the durable store path
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = setup_configuration(&args)?;
    bootstrap_server(config).await
}

/// Load environment configuration and apply CLI overrides
fn setup_configuration(args: &Args) -> Result<ServerConfig> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(db_path) = args.db_path.clone() {
        config.db_path = db_path;
    }

    logging::init(&config)?;
    info!("Starting anonamoose proxy");
    info!("{}", config.summary());
    if config.api_token.is_none() {
        tracing::warn!("API_TOKEN is not set; management endpoints are unauthenticated");
    }
    Ok(config)
}

/// Open storage, assemble resources and serve until shutdown
async fn bootstrap_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create data directory {}", parent.display()))?;
        }
    }

    let database = Arc::new(
        Database::new(&config.db_path)
            .await
            .with_context(|| format!("cannot open database at {}", config.db_path))?,
    );

    let dictionary = Arc::new(
        DictionaryLayer::new(Arc::clone(&database))
            .await
            .context("cannot load dictionary index")?,
    );
    let ner = Arc::new(NerLayer::new(Box::new(HttpClassifierFactory::new(
        config.ner_endpoint.clone(),
    ))));
    let rehydration = Arc::new(RehydrationStore::new(Arc::clone(&database)));
    let session_maps = Arc::new(SessionTokenMap::new());

    let resources = Arc::new(ServerResources {
        settings: SettingsStore::new(Arc::clone(&database)),
        pipeline: RedactionPipeline::new(Arc::clone(&dictionary), Arc::clone(&ner)),
        dictionary,
        ner,
        rehydration: Arc::clone(&rehydration),
        session_maps: Arc::clone(&session_maps),
        upstream: UpstreamClient::new().context("cannot build upstream client")?,
        observability: Arc::new(ObservabilityRing::new()),
        rate_limiter: RateLimiter::default(),
        database,
        config: config.clone(),
    });

    let session_sweeper = rehydration.spawn_sweeper();
    let map_sweeper = session_maps.spawn_sweeper();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("listening on {addr}");

    let app = router(resources).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    session_sweeper.abort();
    map_sweeper.abort();
    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::warn!("cannot install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
