//! Repository for the `archived_deltas` table.
//!
//! Archived deltas are append-only: rows are inserted once and only ever
//! removed together with their document.

use folio_core::types::{DbId, VersionNumber};
use folio_core::versioning::VersionDelta;
use sqlx::PgPool;

use crate::models::archived_delta::ArchivedDeltaRow;

/// Column list for archived_deltas queries.
const COLUMNS: &str = "document_id, version, forward_diff, change_description, editor_id, \
    added_lines, deleted_lines, changed_chars, result_hash, created_at, archived_at";

pub struct ArchivedDeltaRepo;

impl ArchivedDeltaRepo {
    /// Insert a delta unless that version is already archived. Returns `true`
    /// if a row was written.
    pub async fn insert_if_absent(
        pool: &PgPool,
        document_id: DbId,
        delta: &VersionDelta,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO archived_deltas
                (document_id, version, forward_diff, change_description, editor_id,
                 added_lines, deleted_lines, changed_chars, result_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (document_id, version) DO NOTHING",
        )
        .bind(document_id)
        .bind(delta.version)
        .bind(&delta.forward_diff)
        .bind(&delta.change_description)
        .bind(delta.editor_id)
        .bind(delta.added_lines)
        .bind(delta.deleted_lines)
        .bind(delta.changed_chars)
        .bind(&delta.result_hash)
        .bind(delta.created_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(
        pool: &PgPool,
        document_id: DbId,
        version: VersionNumber,
    ) -> Result<Option<ArchivedDeltaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM archived_deltas
             WHERE document_id = $1 AND version = $2"
        );
        sqlx::query_as::<_, ArchivedDeltaRow>(&query)
            .bind(document_id)
            .bind(version)
            .fetch_optional(pool)
            .await
    }

    /// Archived deltas with `from <= version <= to`, ascending.
    pub async fn list_range(
        pool: &PgPool,
        document_id: DbId,
        from: VersionNumber,
        to: VersionNumber,
    ) -> Result<Vec<ArchivedDeltaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM archived_deltas
             WHERE document_id = $1 AND version BETWEEN $2 AND $3
             ORDER BY version ASC"
        );
        sqlx::query_as::<_, ArchivedDeltaRow>(&query)
            .bind(document_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Every archived delta of a document, ascending.
    pub async fn list_by_document(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Vec<ArchivedDeltaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM archived_deltas
             WHERE document_id = $1
             ORDER BY version ASC"
        );
        sqlx::query_as::<_, ArchivedDeltaRow>(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    /// Remove every archived delta of a document, returning the row count.
    pub async fn delete_by_document(pool: &PgPool, document_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM archived_deltas WHERE document_id = $1")
            .bind(document_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
