//! Shared SHA-256 digest helpers.
//!
//! Used by the hash tree and the segment integrity builder so the digest
//! computation lives in one place.

use sha2::{Digest, Sha256};

/// Compute the raw SHA-256 digest of the given bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute a lowercase SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
