//! In-process stores for tests, tooling and single-node embedding.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::config::{VersioningConfig, DEFAULT_HOT_WINDOW};
use crate::error::CoreError;
use crate::types::{DbId, VersionNumber};
use crate::versioning::record::{ArchivedDelta, ContentRecord, VersionDelta};
use crate::versioning::store::{ArchiveStore, VersionStore};
use crate::versioning::CONTENT_RECORD;

/// [`VersionStore`] backed by a map of records.
#[derive(Debug)]
pub struct MemoryVersionStore {
    hot_window: usize,
    records: RwLock<HashMap<DbId, ContentRecord>>,
}

impl MemoryVersionStore {
    pub fn new(hot_window: usize) -> Self {
        Self {
            hot_window,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &VersioningConfig) -> Self {
        Self::new(config.hot_window)
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryVersionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HOT_WINDOW)
    }
}

impl VersionStore for MemoryVersionStore {
    fn hot_window(&self) -> usize {
        self.hot_window
    }

    async fn get(&self, document_id: DbId) -> Result<ContentRecord, CoreError> {
        self.records
            .read()
            .await
            .get(&document_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: CONTENT_RECORD,
                id: document_id,
            })
    }

    async fn initialize(
        &self,
        document_id: DbId,
        content: &str,
        editor_id: Option<DbId>,
    ) -> Result<ContentRecord, CoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&document_id) {
            return Err(CoreError::AlreadyExists {
                entity: CONTENT_RECORD,
                id: document_id,
            });
        }
        let record = ContentRecord::new(document_id, content, editor_id, Utc::now());
        records.insert(document_id, record.clone());
        Ok(record)
    }

    async fn append_delta(
        &self,
        document_id: DbId,
        new_content: &str,
        delta: VersionDelta,
    ) -> Result<Option<VersionDelta>, CoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&document_id).ok_or(CoreError::NotFound {
            entity: CONTENT_RECORD,
            id: document_id,
        })?;

        // Stage on a copy so a rejected append leaves the record untouched.
        let mut staged = record.clone();
        let evicted = staged.push_delta(new_content, delta, self.hot_window)?;
        *record = staged;
        Ok(evicted)
    }

    async fn delete(&self, document_id: DbId) -> Result<(), CoreError> {
        self.records
            .write()
            .await
            .remove(&document_id)
            .map(|_| ())
            .ok_or(CoreError::NotFound {
                entity: CONTENT_RECORD,
                id: document_id,
            })
    }
}

/// [`ArchiveStore`] backed by an ordered map per document.
#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    deltas: RwLock<HashMap<DbId, BTreeMap<VersionNumber, ArchivedDelta>>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total archived deltas across all documents.
    pub async fn total(&self) -> usize {
        self.deltas.read().await.values().map(BTreeMap::len).sum()
    }
}

impl ArchiveStore for MemoryArchiveStore {
    async fn archive(&self, document_id: DbId, delta: &VersionDelta) -> Result<(), CoreError> {
        self.deltas
            .write()
            .await
            .entry(document_id)
            .or_default()
            .entry(delta.version)
            .or_insert_with(|| ArchivedDelta::new(delta.clone(), Utc::now()));
        Ok(())
    }

    async fn find(
        &self,
        document_id: DbId,
        version: VersionNumber,
    ) -> Result<Option<ArchivedDelta>, CoreError> {
        Ok(self
            .deltas
            .read()
            .await
            .get(&document_id)
            .and_then(|versions| versions.get(&version))
            .cloned())
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
        Ok(self
            .deltas
            .read()
            .await
            .get(&document_id)
            .map(|versions| versions.range(from..=to).map(|(_, d)| d.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_all(&self, document_id: DbId) -> Result<Vec<ArchivedDelta>, CoreError> {
        Ok(self
            .deltas
            .read()
            .await
            .get(&document_id)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_all(&self, document_id: DbId) -> Result<u64, CoreError> {
        Ok(self
            .deltas
            .write()
            .await
            .remove(&document_id)
            .map(|versions| versions.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::content_hash;
    use assert_matches::assert_matches;

    fn delta(version: VersionNumber, content: &str) -> VersionDelta {
        VersionDelta {
            version,
            forward_diff: format!("diff for {version}"),
            change_description: Some(format!("edit {version}")),
            editor_id: None,
            created_at: Utc::now(),
            added_lines: 0,
            deleted_lines: 0,
            changed_chars: 0,
            result_hash: content_hash(content),
        }
    }

    // -- version store -------------------------------------------------------

    #[tokio::test]
    async fn get_missing_record_is_not_found() {
        let store = MemoryVersionStore::default();
        assert_matches!(store.get(1).await, Err(CoreError::NotFound { id: 1, .. }));
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let store = MemoryVersionStore::default();
        store.initialize(1, "a", Some(2)).await.unwrap();
        assert_matches!(
            store.initialize(1, "b", None).await,
            Err(CoreError::AlreadyExists { id: 1, .. })
        );
        assert_eq!(store.get(1).await.unwrap().current_content, "a");
    }

    #[tokio::test]
    async fn append_evicts_past_window() {
        let store = MemoryVersionStore::new(2);
        store.initialize(1, "v1", None).await.unwrap();
        assert!(store.append_delta(1, "v2", delta(2, "v2")).await.unwrap().is_none());
        assert!(store.append_delta(1, "v3", delta(3, "v3")).await.unwrap().is_none());

        let evicted = store.append_delta(1, "v4", delta(4, "v4")).await.unwrap();
        assert_eq!(evicted.map(|d| d.version), Some(2));

        let record = store.get(1).await.unwrap();
        assert_eq!(record.current_version, 4);
        assert_eq!(record.recent_deltas.len(), 2);
    }

    #[tokio::test]
    async fn stale_append_leaves_record_untouched() {
        let store = MemoryVersionStore::default();
        store.initialize(1, "v1", None).await.unwrap();
        store.append_delta(1, "v2", delta(2, "v2")).await.unwrap();

        let result = store.append_delta(1, "other", delta(2, "other")).await;
        assert_matches!(result, Err(CoreError::Conflict(_)));

        let record = store.get(1).await.unwrap();
        assert_eq!(record.current_content, "v2");
        assert_eq!(record.recent_deltas.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = MemoryVersionStore::default();
        store.initialize(1, "a", None).await.unwrap();
        store.delete(1).await.unwrap();
        assert!(store.is_empty().await);
        assert_matches!(store.delete(1).await, Err(CoreError::NotFound { .. }));
    }

    // -- archive store -------------------------------------------------------

    #[tokio::test]
    async fn archive_is_idempotent() {
        let archive = MemoryArchiveStore::new();
        let first = delta(2, "v2");
        archive.archive(1, &first).await.unwrap();

        let mut retry = first.clone();
        retry.forward_diff = "something else".into();
        archive.archive(1, &retry).await.unwrap();

        let stored = archive.find(1, 2).await.unwrap().unwrap();
        assert_eq!(stored.delta, first);
        assert_eq!(archive.total().await, 1);
    }

    #[tokio::test]
    async fn find_range_is_inclusive_and_ordered() {
        let archive = MemoryArchiveStore::new();
        for v in [5, 2, 4, 3] {
            archive.archive(1, &delta(v, "x")).await.unwrap();
        }
        archive.archive(2, &delta(3, "other doc")).await.unwrap();

        let versions: Vec<_> = archive
            .find_range(1, 3, 4)
            .await
            .unwrap()
            .iter()
            .map(ArchivedDelta::version)
            .collect();
        assert_eq!(versions, vec![3, 4]);

        assert!(archive.find_range(1, 4, 3).await.unwrap().is_empty());
        assert_eq!(archive.list_all(1).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn delete_all_only_touches_one_document() {
        let archive = MemoryArchiveStore::new();
        archive.archive(1, &delta(2, "a")).await.unwrap();
        archive.archive(1, &delta(3, "b")).await.unwrap();
        archive.archive(2, &delta(2, "c")).await.unwrap();

        assert_eq!(archive.delete_all(1).await.unwrap(), 2);
        assert_eq!(archive.delete_all(1).await.unwrap(), 0);
        assert_eq!(archive.list_all(2).await.unwrap().len(), 1);
    }
}
