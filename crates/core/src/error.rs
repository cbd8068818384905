use crate::types::{DbId, VersionNumber};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: &'static str, id: DbId },

    #[error("Version {version} of document {document_id} not found (current version is {current})")]
    VersionNotFound {
        document_id: DbId,
        version: VersionNumber,
        current: VersionNumber,
    },

    #[error("Patch does not apply: {0}")]
    PatchApply(String),

    #[error("History gap: document {document_id} has no delta for version {version}")]
    HistoryGap {
        document_id: DbId,
        version: VersionNumber,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CoreError {
    /// Transient failures that a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Failures that indicate a corrupted delta chain rather than bad input.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::PatchApply(_) | Self::HistoryGap { .. })
    }
}
