//! Content record model.
//!
//! The row holds only the current state; the hot window lives in
//! `version_deltas` and is attached when the domain record is assembled.

use folio_core::types::{DbId, Timestamp, VersionNumber};
use folio_core::versioning::{ContentRecord, VersionDelta};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `content_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentRecordRow {
    pub document_id: DbId,
    pub current_content: String,
    pub current_version: VersionNumber,
    pub content_hash: String,
    pub last_editor_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ContentRecordRow {
    /// Build the domain record from this row and its hot window, given in
    /// ascending version order.
    pub fn into_record(self, recent_deltas: Vec<VersionDelta>) -> ContentRecord {
        ContentRecord {
            document_id: self.document_id,
            current_content: self.current_content,
            current_version: self.current_version,
            content_hash: self.content_hash,
            recent_deltas,
            last_editor_id: self.last_editor_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
