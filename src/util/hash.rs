//! Hashing helpers for output path derivation.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA256 of a string.
pub fn sha256_str(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// First eight hex digits of [`sha256_str`]; used to bucket object files by
/// source directory.
pub fn short_hash(s: &str) -> String {
    let mut hash = sha256_str(s);
    hash.truncate(8);
    hash
}
