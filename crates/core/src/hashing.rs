//! SHA-256 content digests.
//!
//! Digests detect no-op saves and back the history audit. They are not a
//! tamper-proof integrity mechanism.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Digest of a document body, as stored in `content_hash` / `result_hash`.
pub fn content_hash(content: &str) -> String {
    sha256_hex(content.as_bytes())
}
