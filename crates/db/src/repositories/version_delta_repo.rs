//! Repository for the `version_deltas` table (hot window).

use folio_core::types::{DbId, VersionNumber};
use folio_core::versioning::VersionDelta;
use sqlx::PgExecutor;

use crate::models::version_delta::VersionDeltaRow;

/// Column list for version_deltas queries.
const COLUMNS: &str = "document_id, version, forward_diff, change_description, editor_id, \
    added_lines, deleted_lines, changed_chars, result_hash, created_at";

/// Hot-window rows. Size of the window is enforced by the caller.
pub struct VersionDeltaRepo;

impl VersionDeltaRepo {
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
        delta: &VersionDelta,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO version_deltas
                (document_id, version, forward_diff, change_description, editor_id,
                 added_lines, deleted_lines, changed_chars, result_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
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
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Hot window of a document, ascending by version.
    pub async fn list_by_document<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
    ) -> Result<Vec<VersionDeltaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM version_deltas
             WHERE document_id = $1
             ORDER BY version ASC"
        );
        sqlx::query_as::<_, VersionDeltaRow>(&query)
            .bind(document_id)
            .fetch_all(executor)
            .await
    }

    /// Remove one delta from the window. Returns `true` if a row was removed.
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        document_id: DbId,
        version: VersionNumber,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM version_deltas WHERE document_id = $1 AND version = $2")
                .bind(document_id)
                .bind(version)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
