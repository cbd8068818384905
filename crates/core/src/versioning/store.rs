//! Storage interfaces for the two history tiers.
//!
//! [`VersionStore`] holds each document's current content and its hot window;
//! [`ArchiveStore`] is the append-only cold log of evicted deltas. Both are
//! storage-agnostic: `folio-db` implements them on PostgreSQL and
//! [`crate::versioning::memory`] implements them in process.

use std::future::Future;

use crate::error::CoreError;
use crate::types::{DbId, VersionNumber};
use crate::versioning::record::{ArchivedDelta, ContentRecord, VersionDelta};

/// Current content plus a bounded window of recent deltas, one record per
/// document.
pub trait VersionStore: Send + Sync {
    /// Size of the hot window this store keeps per document.
    fn hot_window(&self) -> usize;

    /// Fetch a record. Fails with [`CoreError::NotFound`] when absent.
    fn get(
        &self,
        document_id: DbId,
    ) -> impl Future<Output = Result<ContentRecord, CoreError>> + Send;

    /// Create a record at version 1. Fails with [`CoreError::AlreadyExists`]
    /// when one is present.
    fn initialize(
        &self,
        document_id: DbId,
        content: &str,
        editor_id: Option<DbId>,
    ) -> impl Future<Output = Result<ContentRecord, CoreError>> + Send;

    /// Atomically make `delta` the newest version with `new_content` as the
    /// current content.
    ///
    /// Compare-and-swap on the version: `delta.version` must directly follow
    /// the stored version, otherwise [`CoreError::Conflict`]. Returns the
    /// delta pushed out of the hot window, which the caller must archive.
    fn append_delta(
        &self,
        document_id: DbId,
        new_content: &str,
        delta: VersionDelta,
    ) -> impl Future<Output = Result<Option<VersionDelta>, CoreError>> + Send;

    /// Remove a record together with its hot window. Archived deltas are the
    /// caller's responsibility.
    fn delete(&self, document_id: DbId) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Append-only cold storage for deltas evicted from the hot window.
pub trait ArchiveStore: Send + Sync {
    /// Store an evicted delta. Idempotent on `(document_id, delta.version)`:
    /// archiving a version that is already present is a no-op.
    fn archive(
        &self,
        document_id: DbId,
        delta: &VersionDelta,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Single archived delta, if present.
    fn find(
        &self,
        document_id: DbId,
        version: VersionNumber,
    ) -> impl Future<Output = Result<Option<ArchivedDelta>, CoreError>> + Send;

    /// Archived deltas with `from <= version <= to`, ascending by version.
    fn find_range(
        &self,
        document_id: DbId,
        from: VersionNumber,
        to: VersionNumber,
    ) -> impl Future<Output = Result<Vec<ArchivedDelta>, CoreError>> + Send;

    /// Every archived delta of a document, ascending by version.
    fn list_all(
        &self,
        document_id: DbId,
    ) -> impl Future<Output = Result<Vec<ArchivedDelta>, CoreError>> + Send;

    /// Remove every archived delta of a document, returning how many were
    /// removed.
    fn delete_all(&self, document_id: DbId) -> impl Future<Output = Result<u64, CoreError>> + Send;
}
