//! # Content Digest
//!
//! SHA-256 identifiers over serialized documents. Two schema documents with
//! the same serialized form share one digest, which lets the descriptor
//! cache reuse a synthesized type across tasks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TaskgateError;

/// A 32-byte SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// SHA-256 over raw bytes.
pub fn sha256_digest(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(bytes)
}

/// SHA-256 over the compact serialization of a JSON value.
///
/// Object keys hash in their stored order, so documents that differ only in
/// key order produce different digests. That matches how record field order
/// is derived from property order.
pub fn digest_json(value: &serde_json::Value) -> Result<ContentDigest, TaskgateError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_digest(&bytes))
}
