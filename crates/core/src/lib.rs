//! Storage-agnostic content versioning.
//!
//! [`diff`] produces and applies line patches, [`versioning`] keeps documents'
//! current content with a hot window of deltas and an archive of older ones.
//! PostgreSQL-backed stores live in `folio-db`.

pub mod config;
pub mod diff;
pub mod error;
pub mod hashing;
pub mod types;
pub mod versioning;
