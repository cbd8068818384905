/// Document and editor identifiers are PostgreSQL BIGINT keys owned by the
/// page-identity layer.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Version numbers start at 1 and grow by one per content change.
pub type VersionNumber = i32;
