//! PostgreSQL implementations of the `folio-core` store traits.

use folio_core::config::VersioningConfig;
use folio_core::error::CoreError;
use folio_core::hashing::content_hash;
use folio_core::types::{DbId, VersionNumber};
use folio_core::versioning::{
    ArchiveStore, ArchivedDelta, ContentRecord, VersionDelta, VersionStore, CONTENT_RECORD,
};
use sqlx::PgPool;

use crate::repositories::content_record_repo::AdvanceRecord;
use crate::repositories::{ArchivedDeltaRepo, ContentRecordRepo, VersionDeltaRepo};

const ARCHIVED_DELTA: &str = "ArchivedDelta";

/// Map a database error onto the engine's taxonomy. Unique violations are
/// reported as [`CoreError::AlreadyExists`]; anything else is treated as a
/// transient store failure.
fn store_error(err: sqlx::Error, entity: &'static str, id: DbId) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        // PostgreSQL unique constraint violation: error code 23505
        if db_err.code().as_deref() == Some("23505") {
            return CoreError::AlreadyExists { entity, id };
        }
    }
    tracing::error!(error = %err, entity, id, "Database error");
    CoreError::StoreUnavailable(err.to_string())
}

// ---------------------------------------------------------------------------
// Version store
// ---------------------------------------------------------------------------

/// [`VersionStore`] over `content_records` + `version_deltas`.
#[derive(Debug, Clone)]
pub struct PgVersionStore {
    pool: PgPool,
    hot_window: usize,
}

impl PgVersionStore {
    pub fn new(pool: PgPool, hot_window: usize) -> Self {
        Self { pool, hot_window }
    }

    pub fn from_config(pool: PgPool, config: &VersioningConfig) -> Self {
        Self::new(pool, config.hot_window)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl VersionStore for PgVersionStore {
    fn hot_window(&self) -> usize {
        self.hot_window
    }

    async fn get(&self, document_id: DbId) -> Result<ContentRecord, CoreError> {
        let db_err = |e| store_error(e, CONTENT_RECORD, document_id);
        // The record and its hot window must come from the same snapshot, or
        // a concurrent append can leave the window out of step with the head.
        let mut tx = crate::begin_snapshot(&self.pool).await.map_err(db_err)?;

        let row = ContentRecordRepo::find_by_id(&mut *tx, document_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: CONTENT_RECORD,
                id: document_id,
            })?;
        let deltas = VersionDeltaRepo::list_by_document(&mut *tx, document_id)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(row.into_record(deltas.into_iter().map(VersionDelta::from).collect()))
    }

    async fn initialize(
        &self,
        document_id: DbId,
        content: &str,
        editor_id: Option<DbId>,
    ) -> Result<ContentRecord, CoreError> {
        let row = ContentRecordRepo::create(
            &self.pool,
            document_id,
            content,
            &content_hash(content),
            editor_id,
        )
        .await
        .map_err(|e| store_error(e, CONTENT_RECORD, document_id))?;
        Ok(row.into_record(Vec::new()))
    }

    /// Runs the whole append in one transaction with the record row locked,
    /// applying the same transition as the in-memory store.
    async fn append_delta(
        &self,
        document_id: DbId,
        new_content: &str,
        delta: VersionDelta,
    ) -> Result<Option<VersionDelta>, CoreError> {
        let db_err = |e| store_error(e, CONTENT_RECORD, document_id);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = ContentRecordRepo::find_by_id_for_update(&mut *tx, document_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: CONTENT_RECORD,
                id: document_id,
            })?;
        let hot = VersionDeltaRepo::list_by_document(&mut *tx, document_id)
            .await
            .map_err(db_err)?;

        let mut record = row.into_record(hot.into_iter().map(VersionDelta::from).collect());
        let expected_version = record.current_version;
        let evicted = record.push_delta(new_content, delta.clone(), self.hot_window)?;

        let advanced = ContentRecordRepo::advance(
            &mut *tx,
            document_id,
            &AdvanceRecord {
                expected_version,
                new_version: record.current_version,
                content: &record.current_content,
                content_hash: &record.content_hash,
                editor_id: record.last_editor_id,
                updated_at: record.updated_at,
            },
        )
        .await
        .map_err(db_err)?;
        if advanced.is_none() {
            return Err(CoreError::Conflict(format!(
                "document {document_id} moved past version {expected_version}"
            )));
        }

        VersionDeltaRepo::insert(&mut *tx, document_id, &delta)
            .await
            .map_err(db_err)?;
        if let Some(evicted) = &evicted {
            VersionDeltaRepo::delete(&mut *tx, document_id, evicted.version)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(evicted)
    }

    async fn delete(&self, document_id: DbId) -> Result<(), CoreError> {
        let deleted = ContentRecordRepo::delete(&self.pool, document_id)
            .await
            .map_err(|e| store_error(e, CONTENT_RECORD, document_id))?;
        if !deleted {
            return Err(CoreError::NotFound {
                entity: CONTENT_RECORD,
                id: document_id,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Archive store
// ---------------------------------------------------------------------------

/// [`ArchiveStore`] over `archived_deltas`.
#[derive(Debug, Clone)]
pub struct PgArchiveStore {
    pool: PgPool,
}

impl PgArchiveStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ArchiveStore for PgArchiveStore {
    async fn archive(&self, document_id: DbId, delta: &VersionDelta) -> Result<(), CoreError> {
        let inserted = ArchivedDeltaRepo::insert_if_absent(&self.pool, document_id, delta)
            .await
            .map_err(|e| store_error(e, ARCHIVED_DELTA, document_id))?;
        if !inserted {
            tracing::debug!(
                document_id,
                version = delta.version,
                "Delta already archived"
            );
        }
        Ok(())
    }

    async fn find(
        &self,
        document_id: DbId,
        version: VersionNumber,
    ) -> Result<Option<ArchivedDelta>, CoreError> {
        let row = ArchivedDeltaRepo::find(&self.pool, document_id, version)
            .await
            .map_err(|e| store_error(e, ARCHIVED_DELTA, document_id))?;
        Ok(row.map(ArchivedDelta::from))
    }

    async fn find_range(
        &self,
        document_id: DbId,
        from: VersionNumber,
        to: VersionNumber,
    ) -> Result<Vec<ArchivedDelta>, CoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let rows = ArchivedDeltaRepo::list_range(&self.pool, document_id, from, to)
            .await
            .map_err(|e| store_error(e, ARCHIVED_DELTA, document_id))?;
        Ok(rows.into_iter().map(ArchivedDelta::from).collect())
    }

    async fn list_all(&self, document_id: DbId) -> Result<Vec<ArchivedDelta>, CoreError> {
        let rows = ArchivedDeltaRepo::list_by_document(&self.pool, document_id)
            .await
            .map_err(|e| store_error(e, ARCHIVED_DELTA, document_id))?;
        Ok(rows.into_iter().map(ArchivedDelta::from).collect())
    }

    async fn delete_all(&self, document_id: DbId) -> Result<u64, CoreError> {
        ArchivedDeltaRepo::delete_by_document(&self.pool, document_id)
            .await
            .map_err(|e| store_error(e, ARCHIVED_DELTA, document_id))
    }
}
