//! Repository for the `content_records` table.

use folio_core::types::{DbId, Timestamp, VersionNumber};
use sqlx::{PgExecutor, PgPool};

use crate::models::content_record::ContentRecordRow;

/// Column list for content_records queries.
const COLUMNS: &str = "document_id, current_content, current_version, content_hash, \
    last_editor_id, created_at, updated_at";

/// New current state written by [`ContentRecordRepo::advance`].
#[derive(Debug, Clone)]
pub struct AdvanceRecord<'a> {
    pub expected_version: VersionNumber,
    pub new_version: VersionNumber,
    pub content: &'a str,
    pub content_hash: &'a str,
    pub editor_id: Option<DbId>,
    pub updated_at: Timestamp,
}

/// Provides create, read, advance and delete for content records.
pub struct ContentRecordRepo;

impl ContentRecordRepo {
    /// Insert a record at version 1. A duplicate id surfaces as a unique
    /// violation.
    pub async fn create(
        pool: &PgPool,
        document_id: DbId,
        content: &str,
        content_hash: &str,
        editor_id: Option<DbId>,
    ) -> Result<ContentRecordRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_records
                (document_id, current_content, current_version, content_hash, last_editor_id)
             VALUES ($1, $2, 1, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(document_id)
            .bind(content)
            .bind(content_hash)
            .bind(editor_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
    ) -> Result<Option<ContentRecordRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM content_records WHERE document_id = $1");
        sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(document_id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`Self::find_by_id`] but locks the row until the surrounding
    /// transaction ends.
    pub async fn find_by_id_for_update<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
    ) -> Result<Option<ContentRecordRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM content_records WHERE document_id = $1 FOR UPDATE");
        sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(document_id)
            .fetch_optional(executor)
            .await
    }

    /// Move a record to its next version if it is still at
    /// `expected_version`. Returns `None` when another writer got there first.
    pub async fn advance<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
        input: &AdvanceRecord<'_>,
    ) -> Result<Option<ContentRecordRow>, sqlx::Error> {
        let query = format!(
            "UPDATE content_records SET
                current_content = $3,
                current_version = $4,
                content_hash = $5,
                last_editor_id = $6,
                updated_at = $7
             WHERE document_id = $1 AND current_version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(document_id)
            .bind(input.expected_version)
            .bind(input.content)
            .bind(input.new_version)
            .bind(input.content_hash)
            .bind(input.editor_id)
            .bind(input.updated_at)
            .fetch_optional(executor)
            .await
    }

    /// Delete a record; its hot-window rows cascade. Returns `true` if a row
    /// was removed.
    pub async fn delete(pool: &PgPool, document_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM content_records WHERE document_id = $1")
            .bind(document_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every stored document id, ascending.
    pub async fn list_document_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> =
            sqlx::query_as("SELECT document_id FROM content_records ORDER BY document_id")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
