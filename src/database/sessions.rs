// ABOUTME: Session table queries: transactional JSON-blob upsert, expiry scans and search
// ABOUTME: One row per session; token bindings serialize into the data column
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;
use crate::errors::AppResult;
use crate::models::{Session, TokenBinding};

fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> AppResult<Session> {
    let data: String = row.try_get("data")?;
    let tokens: Vec<TokenBinding> = serde_json::from_str(&data)?;
    let created_at: String = row.try_get("created_at")?;
    let expires_at: String = row.try_get("expires_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Session {
        session_id: row.try_get("session_id")?,
        tokens,
        created_at: parse_time(&created_at),
        expires_at: parse_time(&expires_at),
        last_accessed_at: parse_time(&updated_at),
    })
}

impl Database {
    /// Insert or replace a session row as one atomic write
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn upsert_session(&self, session: &Session) -> AppResult<()> {
        let data = serde_json::to_string(&session.tokens)?;
        sqlx::query(
            r"
            INSERT INTO sessions (session_id, data, created_at, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                data = excluded.data,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&session.session_id)
        .bind(data)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .bind(session.last_accessed_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetch a session row regardless of expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the read or deserialization fails.
    pub async fn get_session_row(&self, session_id: &str) -> AppResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT session_id, data, created_at, expires_at, updated_at
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    /// Delete one session; returns whether a row was removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_session(&self, session_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session; returns rows removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_all_sessions(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions whose expiry is in the past; returns rows removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// List sessions ordered by creation time, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the read or deserialization fails.
    pub async fn list_sessions(&self) -> AppResult<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT session_id, data, created_at, expires_at, updated_at
             FROM sessions ORDER BY created_at DESC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_to_session).collect()
    }

    /// Count stored sessions
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub async fn count_sessions(&self) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }
}
