// ABOUTME: Settings table queries: JSON-valued key/value rows with update timestamps
// ABOUTME: Values are stored as serialized JSON so booleans, numbers and null round-trip
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use chrono::Utc;
use sqlx::Row;

use super::Database;
use crate::errors::AppResult;

impl Database {
    /// Read one setting value (serialized JSON), if present
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn get_setting(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace one setting value
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn set_setting(&self, key: &str, value: &serde_json::Value) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            r"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Read every stored setting as (key, value) pairs
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn all_settings(&self) -> AppResult<Vec<(String, serde_json::Value)>> {
        let rows = sqlx::query("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(self.pool())
            .await?;
        let mut settings = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            settings.push((key, serde_json::from_str(&raw)?));
        }
        Ok(settings)
    }
}
