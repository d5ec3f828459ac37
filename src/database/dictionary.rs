// ABOUTME: Dictionary table queries: upsert, delete by id or term, list in insertion order
// ABOUTME: Terms are matched case-insensitively on delete-by-term
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;
use crate::errors::AppResult;
use crate::models::DictionaryEntry;

impl Database {
    /// Insert or replace a dictionary entry by id
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_dictionary_entry(&self, entry: &DictionaryEntry) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO dictionary (id, term, replacement, case_sensitive, whole_word, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                term = excluded.term,
                replacement = excluded.replacement,
                case_sensitive = excluded.case_sensitive,
                whole_word = excluded.whole_word,
                enabled = excluded.enabled
            ",
        )
        .bind(&entry.id)
        .bind(&entry.term)
        .bind(&entry.replacement)
        .bind(entry.case_sensitive)
        .bind(entry.whole_word)
        .bind(entry.enabled)
        .bind(entry.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete entries by id; returns rows removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_dictionary_entries_by_id(&self, ids: &[String]) -> AppResult<u64> {
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM dictionary WHERE id = ?")
                .bind(id)
                .execute(self.pool())
                .await?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    /// Delete entries by term name, case-insensitively; returns rows removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_dictionary_entries_by_term(&self, terms: &[String]) -> AppResult<u64> {
        let mut removed = 0;
        for term in terms {
            let result = sqlx::query("DELETE FROM dictionary WHERE LOWER(term) = LOWER(?)")
                .bind(term)
                .execute(self.pool())
                .await?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    /// Delete every entry; returns rows removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_dictionary(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM dictionary")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// List all entries in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn list_dictionary_entries(&self) -> AppResult<Vec<DictionaryEntry>> {
        let rows = sqlx::query(
            "SELECT id, term, replacement, case_sensitive, whole_word, enabled, created_at
             FROM dictionary ORDER BY rowid",
        )
        .fetch_all(self.pool())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.try_get("created_at")?;
            entries.push(DictionaryEntry {
                id: row.try_get("id")?,
                term: row.try_get("term")?,
                replacement: row.try_get("replacement")?,
                case_sensitive: row.try_get("case_sensitive")?,
                whole_word: row.try_get("whole_word")?,
                enabled: row.try_get("enabled")?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            });
        }
        Ok(entries)
    }
}
