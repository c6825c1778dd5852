//! Canonical content hashing used for batch- and reading-level dedup.
//!
//! `content_hash = digest(canonicalize(content))`, where the canonical form
//! sorts object keys and keeps array order, so two payloads that differ
//! only in key order share a hash.
//!
//! `location_hash` covers the pet name, coordinates and accuracy only. The
//! collection timestamp is left out so the same fix reported twice collapses
//! into one reading.

use md5::{Digest, Md5};
use serde_json::Value;

use crate::ImportError;

// ---

/// Byte-stable serialization of `value`, independent of object key order.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, ImportError> {
    // ---
    canonical_json::to_string(value)
        .map(String::into_bytes)
        .map_err(|e| ImportError::InvalidInput(format!("content cannot be canonicalized: {}", e)))
}

/// Lowercase hex MD5 of `bytes` (32 characters).
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

pub fn content_hash(content: &Value) -> Result<String, ImportError> {
    Ok(digest(&canonicalize(content)?))
}

/// Fingerprint of a physical fix.
///
/// Fields are concatenated without separators (8 decimals for coordinates,
/// 2 for accuracy). The tag grammar keeps boundary collisions out of reach.
pub fn location_hash(pet_name: &str, latitude: f64, longitude: f64, accuracy: f64) -> String {
    // ---
    let input = format!("{}{:.8}{:.8}{:.2}", pet_name, latitude, longitude, accuracy);
    digest(input.as_bytes())
}

/// True for a 32-character hex string, the shape of a client-supplied md5.
pub fn looks_like_md5(candidate: &str) -> bool {
    candidate.len() == 32 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}
