//! Archived delta model. Rows are append-only.

use folio_core::types::{DbId, Timestamp, VersionNumber};
use folio_core::versioning::{ArchivedDelta, VersionDelta};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `archived_deltas` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArchivedDeltaRow {
    pub document_id: DbId,
    pub version: VersionNumber,
    pub forward_diff: String,
    pub change_description: Option<String>,
    pub editor_id: Option<DbId>,
    pub added_lines: i32,
    pub deleted_lines: i32,
    pub changed_chars: i32,
    pub result_hash: String,
    pub created_at: Timestamp,
    pub archived_at: Timestamp,
}

impl From<ArchivedDeltaRow> for ArchivedDelta {
    fn from(row: ArchivedDeltaRow) -> Self {
        ArchivedDelta::new(
            VersionDelta {
                version: row.version,
                forward_diff: row.forward_diff,
                change_description: row.change_description,
                editor_id: row.editor_id,
                created_at: row.created_at,
                added_lines: row.added_lines,
                deleted_lines: row.deleted_lines,
                changed_chars: row.changed_chars,
                result_hash: row.result_hash,
            },
            row.archived_at,
        )
    }
}
