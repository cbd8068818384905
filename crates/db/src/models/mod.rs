//! Row structs for the versioning tables.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! conversions into the `folio-core` domain types.

pub mod archived_delta;
pub mod content_record;
pub mod version_delta;
