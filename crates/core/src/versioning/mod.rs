//! Document versioning: a hot window of recent deltas next to the current
//! content, an append-only archive for older deltas, and the manager that
//! keeps the two consistent.

pub mod audit;
pub mod manager;
pub mod memory;
pub mod record;
pub mod store;
pub mod validation;

pub use audit::{HistoryAudit, HistoryIssue};
pub use manager::{SaveVersion, VersionManager};
pub use memory::{MemoryArchiveStore, MemoryVersionStore};
pub use record::{
    ArchivedDelta, ContentRecord, HistoryEntry, StorageTier, VersionDelta, INITIAL_VERSION,
};
pub use store::{ArchiveStore, VersionStore};
pub use validation::{validate_change_description, validate_content, validate_document_id};

/// Entity name used in [`crate::error::CoreError::NotFound`] for documents.
pub const CONTENT_RECORD: &str = "ContentRecord";
