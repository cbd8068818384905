//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods that take part in the append transaction accept any
//! `PgExecutor`, so they run either on the pool or on `&mut *tx`.

pub mod archived_delta_repo;
pub mod content_record_repo;
pub mod version_delta_repo;

pub use archived_delta_repo::ArchivedDeltaRepo;
pub use content_record_repo::ContentRecordRepo;
pub use version_delta_repo::VersionDeltaRepo;
