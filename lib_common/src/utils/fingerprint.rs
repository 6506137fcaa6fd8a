//! # Content Fingerprint
//!
//! A `Fingerprint` is the hex-encoded SHA-256 digest of a serialized payload.
//! Callers hash the exact bytes they are about to send, so two payloads share a
//! fingerprint if and only if subscribers would receive identical content.
//!
//! `serde_json` is built with `preserve_order`, so object keys are written in
//! the order the upstream sent them. The same content delivered with keys in a
//! different order fingerprints differently; the worst case is one redundant
//! update to each subscriber.

use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The digest as a lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of already-serialized content.
pub fn fingerprint(serialized: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
