// ABOUTME: Embedded SQLite storage with schema migration for sessions, settings and dictionary
// ABOUTME: Single-writer engine in WAL mode; all tables created idempotently at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Durable storage
//!
//! One embedded SQLite database holds three logical tables: `sessions`
//! (JSON blob per row, indexed on `expires_at`), `settings` (key/value) and
//! `dictionary`. Table-specific queries live in the sibling modules; this
//! module owns the pool and migrations.

pub mod dictionary;
pub mod sessions;
pub mod settings;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::errors::AppResult;

/// Handle to the embedded database
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a migration fails.
    pub async fn new(path: &str) -> AppResult<Self> {
        let url = format!("sqlite:{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        let db = Self { pool };
        db.configure().await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database (tests)
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn in_memory() -> AppResult<Self> {
        // A single connection keeps the in-memory database alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Reference to the underlying pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Write-ahead logging keeps concurrent readers cheap under the single
    /// writer.
    async fn configure(&self) -> AppResult<()> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Run all schema migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS dictionary (
                id TEXT PRIMARY KEY,
                term TEXT NOT NULL,
                replacement TEXT,
                case_sensitive INTEGER NOT NULL DEFAULT 0,
                whole_word INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Row counts for the storage report: (sessions, dictionary, settings)
    ///
    /// # Errors
    ///
    /// Returns an error if any count query fails.
    pub async fn table_counts(&self) -> AppResult<(i64, i64, i64)> {
        let sessions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        let dictionary: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dictionary")
            .fetch_one(&self.pool)
            .await?;
        let settings: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings")
            .fetch_one(&self.pool)
            .await?;
        Ok((sessions.0, dictionary.0, settings.0))
    }
}
