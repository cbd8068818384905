//! Content records and the deltas that make up their history.

use serde::{Deserialize, Serialize};

use crate::diff::ChangeStats;
use crate::error::CoreError;
use crate::hashing::content_hash;
use crate::types::{DbId, Timestamp, VersionNumber};

/// Version assigned to a freshly initialized document.
pub const INITIAL_VERSION: VersionNumber = 1;

/// The current state of a versioned document plus its hot window of deltas.
///
/// Invariants maintained by [`ContentRecord::push_delta`]:
/// - `current_version` is 1 plus the number of deltas ever created;
/// - `recent_deltas` is contiguous, ascending and ends at `current_version`
///   (or is empty while the document is at version 1);
/// - `recent_deltas.len()` never exceeds the hot window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub document_id: DbId,
    pub current_content: String,
    pub current_version: VersionNumber,
    pub content_hash: String,
    pub recent_deltas: Vec<VersionDelta>,
    pub last_editor_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A forward diff from version `version - 1` to `version`. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDelta {
    pub version: VersionNumber,
    pub forward_diff: String,
    pub change_description: Option<String>,
    pub editor_id: Option<DbId>,
    pub created_at: Timestamp,
    pub added_lines: i32,
    pub deleted_lines: i32,
    pub changed_chars: i32,
    /// Hash of the content this delta produces.
    pub result_hash: String,
}

/// A delta evicted from the hot window into cold storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedDelta {
    #[serde(flatten)]
    pub delta: VersionDelta,
    pub archived_at: Timestamp,
}

/// Which tier a history entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Hot,
    Archived,
}

/// One row of a version-history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub delta: VersionDelta,
    pub tier: StorageTier,
}

impl ContentRecord {
    /// A brand-new record at version 1 holding the full content.
    pub fn new(
        document_id: DbId,
        content: &str,
        editor_id: Option<DbId>,
        now: Timestamp,
    ) -> Self {
        Self {
            document_id,
            current_content: content.to_string(),
            current_version: INITIAL_VERSION,
            content_hash: content_hash(content),
            recent_deltas: Vec::new(),
            last_editor_id: editor_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowest version still held in the hot window.
    pub fn oldest_hot_version(&self) -> Option<VersionNumber> {
        self.recent_deltas.first().map(|d| d.version)
    }

    /// The hot delta that produced `version`, if it is still in the window.
    pub fn hot_delta(&self, version: VersionNumber) -> Option<&VersionDelta> {
        self.recent_deltas
            .binary_search_by_key(&version, |d| d.version)
            .ok()
            .map(|idx| &self.recent_deltas[idx])
    }

    /// Versions whose deltas are expected to live in the archive.
    ///
    /// Empty when nothing has been evicted yet.
    pub fn archived_versions(&self) -> std::ops::RangeInclusive<VersionNumber> {
        let first_hot = self
            .oldest_hot_version()
            .unwrap_or(self.current_version + 1);
        (INITIAL_VERSION + 1)..=(first_hot - 1)
    }

    /// The delta the next append will push out of a window of size
    /// `hot_window`.
    pub fn next_eviction(&self, hot_window: usize) -> Option<&VersionDelta> {
        if self.recent_deltas.len() >= hot_window {
            self.recent_deltas.first()
        } else {
            None
        }
    }

    /// Append `delta` as the next version, replacing the current content.
    ///
    /// Fails with [`CoreError::Conflict`] unless `delta.version` directly
    /// follows `current_version`, and with [`CoreError::Validation`] when the
    /// delta's `result_hash` does not describe `new_content`. Returns the
    /// delta evicted from the hot window, if any.
    pub fn push_delta(
        &mut self,
        new_content: &str,
        delta: VersionDelta,
        hot_window: usize,
    ) -> Result<Option<VersionDelta>, CoreError> {
        if delta.version != self.current_version + 1 {
            return Err(CoreError::Conflict(format!(
                "document {} is at version {}, cannot append version {}",
                self.document_id, self.current_version, delta.version
            )));
        }
        let new_hash = content_hash(new_content);
        if new_hash != delta.result_hash {
            return Err(CoreError::Validation(format!(
                "result hash of version {} does not match the new content",
                delta.version
            )));
        }

        self.current_content = new_content.to_string();
        self.current_version = delta.version;
        self.content_hash = new_hash;
        self.last_editor_id = delta.editor_id;
        self.updated_at = delta.created_at;
        self.recent_deltas.push(delta);

        if self.recent_deltas.len() > hot_window {
            Ok(Some(self.recent_deltas.remove(0)))
        } else {
            Ok(None)
        }
    }
}

impl VersionDelta {
    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            added_lines: self.added_lines,
            deleted_lines: self.deleted_lines,
            changed_chars: self.changed_chars,
        }
    }
}

impl ArchivedDelta {
    pub fn new(delta: VersionDelta, archived_at: Timestamp) -> Self {
        Self { delta, archived_at }
    }

    pub fn version(&self) -> VersionNumber {
        self.delta.version
    }
}
