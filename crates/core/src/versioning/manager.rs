//! Orchestrates saves, hot-window eviction and history reconstruction.
//!
//! A save moves through: hash check → (unchanged: return the stored record) →
//! diff → archive the delta about to be evicted → atomic append. The archive
//! write happens first and is idempotent, so a failure at any step leaves the
//! stored version untouched and the save can simply be retried.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;

use crate::config::VersioningConfig;
use crate::diff::{compute_diff, diff_texts, reverse_patch, verify_patch, ChangeStats};
use crate::error::CoreError;
use crate::hashing::content_hash;
use crate::types::{DbId, VersionNumber};
use crate::versioning::record::{
    ContentRecord, HistoryEntry, StorageTier, VersionDelta, INITIAL_VERSION,
};
use crate::versioning::store::{ArchiveStore, VersionStore};
use crate::versioning::validation::{
    validate_change_description, validate_content, validate_document_id,
};

/// Input for [`VersionManager::save_new_version`].
#[derive(Debug, Clone, Deserialize)]
pub struct SaveVersion {
    pub document_id: DbId,
    pub content: String,
    pub change_description: Option<String>,
    pub editor_id: Option<DbId>,
    /// Version the editor started from. A save against a document that has
    /// moved on fails with [`CoreError::Conflict`]. `Some(0)` asserts that
    /// the document does not exist yet.
    pub expected_version: Option<VersionNumber>,
}

/// Entry point for every versioning operation on a pair of stores.
#[derive(Debug)]
pub struct VersionManager<S, A> {
    store: S,
    archive: A,
    config: VersioningConfig,
}

impl<S: VersionStore, A: ArchiveStore> VersionManager<S, A> {
    pub fn new(store: S, archive: A, config: VersioningConfig) -> Self {
        Self {
            store,
            archive,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    /// Current record of a document.
    pub async fn get_record(&self, document_id: DbId) -> Result<ContentRecord, CoreError> {
        self.store.get(document_id).await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Record `input.content` as the newest version of the document.
    ///
    /// Creates the document at version 1 when absent and returns the stored
    /// record unchanged when the content hash matches the current content.
    pub async fn save_new_version(&self, input: &SaveVersion) -> Result<ContentRecord, CoreError> {
        let document_id = input.document_id;
        validate_document_id(document_id)?;
        validate_content(&input.content, &self.config)?;
        validate_change_description(input.change_description.as_deref(), &self.config)?;

        let record = match self.store.get(document_id).await {
            Ok(record) => record,
            Err(CoreError::NotFound { .. }) => return self.initialize(input).await,
            Err(err) => return Err(err),
        };

        let new_hash = content_hash(&input.content);
        if new_hash == record.content_hash {
            tracing::debug!(
                document_id,
                version = record.current_version,
                "Content unchanged, skipping save"
            );
            return Ok(record);
        }

        if let Some(expected) = input.expected_version {
            if expected != record.current_version {
                tracing::warn!(
                    document_id,
                    expected,
                    current = record.current_version,
                    "Rejected save against a stale version"
                );
                return Err(CoreError::Conflict(format!(
                    "document {document_id} is at version {}, expected {expected}",
                    record.current_version
                )));
            }
        }

        let patch = diff_texts(&record.current_content, &input.content);
        let forward_diff = patch.to_string();
        verify_patch(&record.current_content, &input.content, &forward_diff).map_err(|err| {
            tracing::error!(
                document_id,
                version = record.current_version + 1,
                error = %err,
                "Computed diff does not round-trip, refusing to store it"
            );
            CoreError::from(err)
        })?;
        let stats = ChangeStats::from_patch(&patch, &record.current_content, &input.content);
        let delta = VersionDelta {
            version: record.current_version + 1,
            forward_diff,
            change_description: input.change_description.clone(),
            editor_id: input.editor_id,
            created_at: Utc::now(),
            added_lines: stats.added_lines,
            deleted_lines: stats.deleted_lines,
            changed_chars: stats.changed_chars,
            result_hash: new_hash,
        };

        // Predict the eviction on a local copy; the store applies the same
        // transition under its compare-and-swap.
        let mut updated = record.clone();
        let predicted = updated.push_delta(&input.content, delta.clone(), self.store.hot_window())?;
        if let Some(evicting) = &predicted {
            self.archive.archive(document_id, evicting).await?;
        }

        let evicted = self
            .store
            .append_delta(document_id, &input.content, delta)
            .await
            .inspect_err(|err| {
                if let CoreError::Conflict(reason) = err {
                    tracing::warn!(document_id, %reason, "Lost a concurrent save race");
                }
            })?;

        if let Some(evicted) = &evicted {
            if predicted.as_ref().map(|d| d.version) != Some(evicted.version) {
                tracing::error!(
                    document_id,
                    evicted_version = evicted.version,
                    "Store evicted an unexpected delta, archiving it now"
                );
                self.archive.archive(document_id, evicted).await?;
            }
        }

        tracing::info!(
            document_id,
            version = updated.current_version,
            added_lines = stats.added_lines,
            deleted_lines = stats.deleted_lines,
            evicted_version = evicted.as_ref().map(|d| d.version),
            "Document version saved"
        );

        Ok(updated)
    }

    async fn initialize(&self, input: &SaveVersion) -> Result<ContentRecord, CoreError> {
        if let Some(expected) = input.expected_version.filter(|v| *v != 0) {
            return Err(CoreError::Conflict(format!(
                "document {} does not exist, expected version {expected}",
                input.document_id
            )));
        }

        // A new document owns no archived history; drop rows left behind by
        // an interrupted delete of the same id.
        let purged = self.archive.delete_all(input.document_id).await?;
        if purged > 0 {
            tracing::warn!(
                document_id = input.document_id,
                purged,
                "Purged orphaned archived deltas"
            );
        }

        let record = self
            .store
            .initialize(input.document_id, &input.content, input.editor_id)
            .await?;
        tracing::info!(
            document_id = record.document_id,
            version = record.current_version,
            "Document initialized"
        );
        Ok(record)
    }

    /// Save the content of `target` as a new version.
    ///
    /// Without an explicit `expected_version` the save is pinned to the version
    /// the content was reconstructed from.
    pub async fn revert_to_version(
        &self,
        document_id: DbId,
        target: VersionNumber,
        editor_id: Option<DbId>,
        expected_version: Option<VersionNumber>,
    ) -> Result<ContentRecord, CoreError> {
        let record = self.store.get(document_id).await?;
        let content = self.reconstruct(&record, target).await?;

        let saved = self
            .save_new_version(&SaveVersion {
                document_id,
                content,
                change_description: Some(format!("Reverted to version {target}")),
                editor_id,
                expected_version: expected_version.or(Some(record.current_version)),
            })
            .await?;

        tracing::info!(
            document_id,
            reverted_to = target,
            version = saved.current_version,
            "Document reverted"
        );
        Ok(saved)
    }

    /// Remove a document with its whole history.
    ///
    /// The record goes first, so readers never see a live document whose
    /// archived versions are already gone. If the archive delete then fails,
    /// the leftover rows are unreachable and are purged by a retry (which
    /// still reports [`CoreError::NotFound`]) or by the next initialize of the
    /// same id.
    pub async fn delete_document(&self, document_id: DbId) -> Result<(), CoreError> {
        match self.store.delete(document_id).await {
            Ok(()) => {}
            Err(err @ CoreError::NotFound { .. }) => {
                let purged = self.archive.delete_all(document_id).await?;
                if purged > 0 {
                    tracing::warn!(document_id, purged, "Purged orphaned archived deltas");
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }
        let archived = self.archive.delete_all(document_id).await?;

        tracing::info!(
            document_id,
            archived_deltas = archived,
            "Document history deleted"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Content of the document as it was at `target_version`.
    pub async fn get_version_content(
        &self,
        document_id: DbId,
        target_version: VersionNumber,
    ) -> Result<String, CoreError> {
        let record = self.store.get(document_id).await?;
        self.reconstruct(&record, target_version).await
    }

    /// Fresh diff between two reconstructed versions.
    pub async fn compare_versions(
        &self,
        document_id: DbId,
        v1: VersionNumber,
        v2: VersionNumber,
    ) -> Result<String, CoreError> {
        let record = self.store.get(document_id).await?;
        let old = self.reconstruct(&record, v1).await?;
        let new = self.reconstruct(&record, v2).await?;
        Ok(compute_diff(&old, &new))
    }

    /// Hot-window deltas, newest first.
    pub async fn get_recent_versions(
        &self,
        document_id: DbId,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let record = self.store.get(document_id).await?;
        Ok(record
            .recent_deltas
            .into_iter()
            .rev()
            .map(|delta| HistoryEntry {
                delta,
                tier: StorageTier::Hot,
            })
            .collect())
    }

    /// Every delta from both tiers, newest first.
    ///
    /// A version present in both tiers (left behind by an interrupted save)
    /// is listed once, from the hot window.
    pub async fn get_all_version_history(
        &self,
        document_id: DbId,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let record = self.store.get(document_id).await?;
        let archived = self.archive.list_all(document_id).await?;

        let mut entries: BTreeMap<VersionNumber, HistoryEntry> = BTreeMap::new();
        for entry in archived {
            entries.insert(
                entry.delta.version,
                HistoryEntry {
                    delta: entry.delta,
                    tier: StorageTier::Archived,
                },
            );
        }
        for delta in record.recent_deltas {
            entries.insert(
                delta.version,
                HistoryEntry {
                    delta,
                    tier: StorageTier::Hot,
                },
            );
        }

        Ok(entries.into_values().rev().collect())
    }

    // -----------------------------------------------------------------------
    // Reconstruction
    // -----------------------------------------------------------------------

    /// Deltas needed to walk from the current version down to `down_to`,
    /// keyed by version. Missing versions are simply absent.
    pub(crate) async fn collect_deltas(
        &self,
        record: &ContentRecord,
        down_to: VersionNumber,
    ) -> Result<BTreeMap<VersionNumber, (VersionDelta, StorageTier)>, CoreError> {
        let mut deltas = BTreeMap::new();

        let archived = record.archived_versions();
        let from = (*archived.start()).max(down_to + 1);
        if from <= *archived.end() {
            for entry in self
                .archive
                .find_range(record.document_id, from, *archived.end())
                .await?
            {
                deltas.insert(entry.delta.version, (entry.delta, StorageTier::Archived));
            }
        }
        for delta in record.recent_deltas.iter().filter(|d| d.version > down_to) {
            deltas.insert(delta.version, (delta.clone(), StorageTier::Hot));
        }

        Ok(deltas)
    }

    pub(crate) async fn reconstruct(
        &self,
        record: &ContentRecord,
        target: VersionNumber,
    ) -> Result<String, CoreError> {
        let document_id = record.document_id;
        if target < INITIAL_VERSION || target > record.current_version {
            return Err(CoreError::VersionNotFound {
                document_id,
                version: target,
                current: record.current_version,
            });
        }
        if target == record.current_version {
            return Ok(record.current_content.clone());
        }

        let deltas = self.collect_deltas(record, target).await?;
        tracing::debug!(
            document_id,
            target,
            current = record.current_version,
            loaded = deltas.len(),
            "Reconstructing version"
        );

        let mut content = record.current_content.clone();
        let mut cursor = record.current_version;
        while cursor > target {
            let Some((delta, tier)) = deltas.get(&cursor) else {
                tracing::error!(document_id, version = cursor, "Delta missing from both tiers");
                return Err(CoreError::HistoryGap {
                    document_id,
                    version: cursor,
                });
            };
            content = reverse_patch(&content, &delta.forward_diff).map_err(|err| {
                tracing::error!(
                    document_id,
                    version = cursor,
                    tier = ?tier,
                    error = %err,
                    "Reverse patch failed"
                );
                CoreError::from(err)
            })?;
            cursor -= 1;
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::versioning::memory::{MemoryArchiveStore, MemoryVersionStore};
    use crate::versioning::record::ArchivedDelta;
    use assert_matches::assert_matches;

    type Manager = VersionManager<MemoryVersionStore, MemoryArchiveStore>;

    const DOC: DbId = 42;

    fn manager() -> Manager {
        let config = VersioningConfig::default();
        VersionManager::new(
            MemoryVersionStore::from_config(&config),
            MemoryArchiveStore::new(),
            config,
        )
    }

    fn save(content: &str) -> SaveVersion {
        SaveVersion {
            document_id: DOC,
            content: content.to_string(),
            change_description: None,
            editor_id: Some(7),
            expected_version: None,
        }
    }

    fn nth_content(n: usize) -> String {
        (1..=n).map(|i| format!("paragraph {i}\n")).collect()
    }

    /// Saves `nth_content(1..=count)` and returns what was saved per version.
    async fn save_series(manager: &Manager, count: usize) -> Vec<String> {
        let mut saved = Vec::new();
        for n in 1..=count {
            let content = nth_content(n);
            manager.save_new_version(&save(&content)).await.unwrap();
            saved.push(content);
        }
        saved
    }

    // -- saves ---------------------------------------------------------------

    #[tokio::test]
    async fn first_save_initializes_at_version_one() {
        let manager = manager();
        let record = manager.save_new_version(&save("Hello\n")).await.unwrap();
        assert_eq!(record.current_version, 1);
        assert!(record.recent_deltas.is_empty());
        assert_eq!(record.last_editor_id, Some(7));
    }

    #[tokio::test]
    async fn added_line_creates_version_two() {
        let manager = manager();
        manager.save_new_version(&save("Hello\n")).await.unwrap();

        let mut input = save("Hello\nWorld\n");
        input.change_description = Some("add line".into());
        let record = manager.save_new_version(&input).await.unwrap();

        assert_eq!(record.current_version, 2);
        let delta = &record.recent_deltas[0];
        assert_eq!(delta.change_description.as_deref(), Some("add line"));
        assert_eq!((delta.added_lines, delta.deleted_lines), (1, 0));
        assert_eq!(delta.changed_chars, 6);
        assert_eq!(manager.get_version_content(DOC, 1).await.unwrap(), "Hello\n");
        assert_eq!(
            manager.get_version_content(DOC, 2).await.unwrap(),
            "Hello\nWorld\n"
        );
    }

    #[tokio::test]
    async fn identical_save_is_a_no_op() {
        let manager = manager();
        manager.save_new_version(&save("v1")).await.unwrap();
        let first = manager.save_new_version(&save("v2")).await.unwrap();
        let second = manager.save_new_version(&save("v2")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.current_version, 2);
        assert_eq!(manager.get_record(DOC).await.unwrap(), first);
    }

    #[tokio::test]
    async fn versions_count_distinct_saves() {
        let manager = manager();
        save_series(&manager, 5).await;
        manager.save_new_version(&save(&nth_content(5))).await.unwrap();
        assert_eq!(manager.get_record(DOC).await.unwrap().current_version, 5);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let manager = manager();
        save_series(&manager, 3).await;

        let mut input = save("someone else's edit");
        input.expected_version = Some(2);
        assert_matches!(
            manager.save_new_version(&input).await,
            Err(CoreError::Conflict(_))
        );

        input.expected_version = Some(3);
        let record = manager.save_new_version(&input).await.unwrap();
        assert_eq!(record.current_version, 4);
    }

    #[tokio::test]
    async fn resubmission_with_stale_expectation_stays_idempotent() {
        let manager = manager();
        save_series(&manager, 2).await;

        let mut retry = save(&nth_content(2));
        retry.expected_version = Some(1);
        let record = manager.save_new_version(&retry).await.unwrap();
        assert_eq!(record.current_version, 2);
    }

    #[tokio::test]
    async fn expected_version_on_missing_document() {
        let manager = manager();
        let mut input = save("new page");
        input.expected_version = Some(3);
        assert_matches!(
            manager.save_new_version(&input).await,
            Err(CoreError::Conflict(_))
        );

        input.expected_version = Some(0);
        assert_eq!(
            manager.save_new_version(&input).await.unwrap().current_version,
            1
        );
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_storage() {
        let manager = manager();
        let mut input = save("text");
        input.document_id = 0;
        assert_matches!(
            manager.save_new_version(&input).await,
            Err(CoreError::Validation(_))
        );

        let mut input = save("text");
        input.change_description = Some("  ".into());
        assert_matches!(
            manager.save_new_version(&input).await,
            Err(CoreError::Validation(_))
        );
        assert!(manager.store().is_empty().await);
    }

    // -- hot window and archive ----------------------------------------------

    #[tokio::test]
    async fn twelve_saves_spill_two_versions_to_archive() {
        let manager = manager();
        let saved = save_series(&manager, 12).await;

        let record = manager.get_record(DOC).await.unwrap();
        assert_eq!(record.current_version, 12);
        let hot: Vec<_> = record.recent_deltas.iter().map(|d| d.version).collect();
        assert_eq!(hot, (3..=12).collect::<Vec<_>>());

        let archived: Vec<_> = manager
            .archive()
            .list_all(DOC)
            .await
            .unwrap()
            .iter()
            .map(ArchivedDelta::version)
            .collect();
        assert_eq!(archived, vec![2]);

        assert_eq!(manager.get_version_content(DOC, 1).await.unwrap(), saved[0]);
    }

    #[tokio::test]
    async fn every_version_reconstructs_exactly() {
        let manager = manager();
        let mut saved = Vec::new();
        let edits = [
            "title\n\nintro\n",
            "title\n\nintro\nbody\n",
            "Title\n\nintro\nbody\n",
            "Title\n\nbody\n",
            "Title\n\nbody\nfooter",
            "",
            "fresh start\r\nwith crlf\r\n",
            "fresh start\r\nwith crlf\r\nand more\n",
        ];
        for round in 0..3 {
            for edit in edits {
                let content = format!("{edit}round {round}\n");
                manager.save_new_version(&save(&content)).await.unwrap();
                saved.push(content);
            }
        }

        let record = manager.get_record(DOC).await.unwrap();
        assert_eq!(record.current_version as usize, saved.len());
        assert_eq!(record.recent_deltas.len(), 10);
        for (idx, expected) in saved.iter().enumerate() {
            let version = idx as VersionNumber + 1;
            assert_eq!(
                &manager.get_version_content(DOC, version).await.unwrap(),
                expected,
                "version {version}"
            );
        }
    }

    #[tokio::test]
    async fn out_of_range_versions_are_not_found() {
        let manager = manager();
        save_series(&manager, 3).await;
        assert_matches!(
            manager.get_version_content(DOC, 4).await,
            Err(CoreError::VersionNotFound {
                version: 4,
                current: 3,
                ..
            })
        );
        assert_matches!(
            manager.get_version_content(DOC, 0).await,
            Err(CoreError::VersionNotFound { version: 0, .. })
        );
        assert_matches!(
            manager.get_version_content(99, 1).await,
            Err(CoreError::NotFound { id: 99, .. })
        );
    }

    #[tokio::test]
    async fn missing_archived_delta_is_a_history_gap() {
        let manager = manager();
        save_series(&manager, 12).await;
        manager.archive().delete_all(DOC).await.unwrap();

        assert_matches!(
            manager.get_version_content(DOC, 1).await,
            Err(CoreError::HistoryGap { version: 2, .. })
        );
        // Versions still covered by the hot window are unaffected.
        assert_eq!(
            manager.get_version_content(DOC, 2).await.unwrap(),
            nth_content(2)
        );
    }

    #[tokio::test]
    async fn corrupted_delta_fails_reconstruction() {
        let manager = manager();
        save_series(&manager, 12).await;

        // Swap the archived delta for one that does not fit the chain.
        manager.archive().delete_all(DOC).await.unwrap();
        let mut bogus = manager.get_record(DOC).await.unwrap().recent_deltas[0].clone();
        bogus.version = 2;
        manager.archive().archive(DOC, &bogus).await.unwrap();

        let err = manager.get_version_content(DOC, 1).await.unwrap_err();
        assert_matches!(err, CoreError::PatchApply(_));
        assert!(err.is_integrity_failure());
    }

    #[tokio::test]
    async fn clearing_a_one_line_page_keeps_history() {
        let manager = manager();
        manager.save_new_version(&save("x\n")).await.unwrap();
        let record = manager.save_new_version(&save("\n")).await.unwrap();
        assert_eq!(record.current_version, 2);

        assert_eq!(manager.get_version_content(DOC, 1).await.unwrap(), "x\n");
        assert!(manager.verify_history(DOC).await.unwrap().is_healthy());
    }

    #[tokio::test]
    async fn diff_heavy_lines_reconstruct() {
        let manager = manager();
        let saved = [
            "caa@@ -1 +1 @@ +a+\n",
            "\n",
            "+\n-\n \n@@ -0,0 +0,0 @@\n",
            "-\n+\n\n\n",
            "",
            "--- a\n+++ b\n",
        ];
        for content in saved {
            manager.save_new_version(&save(content)).await.unwrap();
        }
        for (idx, expected) in saved.iter().enumerate() {
            assert_eq!(
                &manager
                    .get_version_content(DOC, idx as VersionNumber + 1)
                    .await
                    .unwrap(),
                expected
            );
        }
    }

    // -- comparisons and history ---------------------------------------------

    #[tokio::test]
    async fn compare_matches_fresh_diff() {
        let manager = manager();
        let saved = save_series(&manager, 12).await;

        let diff = manager.compare_versions(DOC, 2, 12).await.unwrap();
        assert_eq!(diff, compute_diff(&saved[1], &saved[11]));

        let backwards = manager.compare_versions(DOC, 12, 2).await.unwrap();
        assert_eq!(backwards, compute_diff(&saved[11], &saved[1]));
        assert_eq!(manager.compare_versions(DOC, 5, 5).await.unwrap(), "");
    }

    #[tokio::test]
    async fn history_listings_are_newest_first() {
        let manager = manager();
        save_series(&manager, 12).await;

        let recent = manager.get_recent_versions(DOC).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].delta.version, 12);
        assert!(recent.iter().all(|e| e.tier == StorageTier::Hot));

        let all = manager.get_all_version_history(DOC).await.unwrap();
        let versions: Vec<_> = all.iter().map(|e| e.delta.version).collect();
        assert_eq!(versions, (2..=12).rev().collect::<Vec<_>>());
        assert_eq!(all.last().map(|e| e.tier), Some(StorageTier::Archived));
    }

    // -- revert and delete ---------------------------------------------------

    #[tokio::test]
    async fn revert_saves_old_content_as_new_version() {
        let manager = manager();
        let saved = save_series(&manager, 4).await;

        let record = manager.revert_to_version(DOC, 2, Some(8), None).await.unwrap();
        assert_eq!(record.current_version, 5);
        assert_eq!(record.current_content, saved[1]);
        assert_eq!(record.last_editor_id, Some(8));
        assert_eq!(
            record.recent_deltas.last().unwrap().change_description.as_deref(),
            Some("Reverted to version 2")
        );

        let unchanged = manager.revert_to_version(DOC, 5, None, None).await.unwrap();
        assert_eq!(unchanged.current_version, 5);
    }

    #[tokio::test]
    async fn delete_removes_both_tiers() {
        let manager = manager();
        save_series(&manager, 12).await;

        manager.delete_document(DOC).await.unwrap();
        assert_matches!(manager.get_record(DOC).await, Err(CoreError::NotFound { .. }));
        assert_eq!(manager.archive().total().await, 0);
        assert_matches!(
            manager.delete_document(DOC).await,
            Err(CoreError::NotFound { .. })
        );
    }

    // -- atomicity -----------------------------------------------------------

    /// Archive that can be switched into failing every write.
    #[derive(Default)]
    struct FlakyArchive {
        inner: MemoryArchiveStore,
        failing: AtomicBool,
    }

    impl ArchiveStore for FlakyArchive {
        async fn archive(&self, document_id: DbId, delta: &VersionDelta) -> Result<(), CoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::StoreUnavailable("archive offline".into()));
            }
            self.inner.archive(document_id, delta).await
        }

        async fn find(
            &self,
            document_id: DbId,
            version: VersionNumber,
        ) -> Result<Option<ArchivedDelta>, CoreError> {
            self.inner.find(document_id, version).await
        }

        async fn find_range(
            &self,
            document_id: DbId,
            from: VersionNumber,
            to: VersionNumber,
        ) -> Result<Vec<ArchivedDelta>, CoreError> {
            self.inner.find_range(document_id, from, to).await
        }

        async fn list_all(&self, document_id: DbId) -> Result<Vec<ArchivedDelta>, CoreError> {
            self.inner.list_all(document_id).await
        }

        async fn delete_all(&self, document_id: DbId) -> Result<u64, CoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::StoreUnavailable("archive offline".into()));
            }
            self.inner.delete_all(document_id).await
        }
    }

    #[tokio::test]
    async fn failed_archive_leaves_version_untouched() {
        let manager = VersionManager::new(
            MemoryVersionStore::new(10),
            FlakyArchive::default(),
            VersioningConfig::default(),
        );
        for n in 1..=11 {
            manager.save_new_version(&save(&nth_content(n))).await.unwrap();
        }

        manager.archive().failing.store(true, Ordering::SeqCst);
        let err = manager
            .save_new_version(&save(&nth_content(12)))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let record = manager.get_record(DOC).await.unwrap();
        assert_eq!(record.current_version, 11);
        assert_eq!(record.recent_deltas.first().map(|d| d.version), Some(2));

        manager.archive().failing.store(false, Ordering::SeqCst);
        let record = manager
            .save_new_version(&save(&nth_content(12)))
            .await
            .unwrap();
        assert_eq!(record.current_version, 12);
        assert_eq!(
            manager.get_version_content(DOC, 1).await.unwrap(),
            nth_content(1)
        );
    }

    #[tokio::test]
    async fn archived_copy_of_hot_delta_is_listed_once() {
        let manager = manager();
        save_series(&manager, 11).await;

        // Simulates a save that archived version 2 and then failed to append.
        let hot_two = manager.get_record(DOC).await.unwrap().recent_deltas[0].clone();
        manager.archive().archive(DOC, &hot_two).await.unwrap();

        let all = manager.get_all_version_history(DOC).await.unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.iter().all(|e| e.tier == StorageTier::Hot));
        assert_eq!(
            manager.get_version_content(DOC, 1).await.unwrap(),
            nth_content(1)
        );
    }

    #[tokio::test]
    async fn interrupted_delete_leaves_no_live_document() {
        let manager = VersionManager::new(
            MemoryVersionStore::new(10),
            FlakyArchive::default(),
            VersioningConfig::default(),
        );
        for n in 1..=12 {
            manager.save_new_version(&save(&nth_content(n))).await.unwrap();
        }

        manager.archive().failing.store(true, Ordering::SeqCst);
        let err = manager.delete_document(DOC).await.unwrap_err();
        assert!(err.is_retryable());
        assert_matches!(manager.get_record(DOC).await, Err(CoreError::NotFound { .. }));
        assert_eq!(manager.archive().inner.total().await, 1);

        // The retry reports the record as gone but still clears the archive.
        manager.archive().failing.store(false, Ordering::SeqCst);
        assert_matches!(
            manager.delete_document(DOC).await,
            Err(CoreError::NotFound { .. })
        );
        assert_eq!(manager.archive().inner.total().await, 0);
    }

    #[tokio::test]
    async fn recreated_document_ignores_orphaned_archive() {
        let manager = manager();
        save_series(&manager, 12).await;

        // Leftovers of a delete whose archive step never ran.
        manager.store().delete(DOC).await.unwrap();
        assert_eq!(manager.archive().total().await, 1);

        let fresh: Vec<String> = (1..=12).map(|n| format!("rewrite {n}\n")).collect();
        for content in &fresh {
            manager.save_new_version(&save(content)).await.unwrap();
        }

        for (idx, expected) in fresh.iter().enumerate() {
            assert_eq!(
                &manager
                    .get_version_content(DOC, idx as VersionNumber + 1)
                    .await
                    .unwrap(),
                expected
            );
        }
        assert!(manager.verify_history(DOC).await.unwrap().is_healthy());
    }
}
