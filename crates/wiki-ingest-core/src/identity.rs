//! Identity keys and content hashes for character records.
//!
//! A record's key is its source-assigned `id` when that id is well formed,
//! otherwise a key derived from the normalized `(name, universe)` pair:
//!
//! ```rust
//! use wiki_ingest_core::identity::derive_key;
//!
//! let a = derive_key("Arthur Morgan", "Red Dead");
//! let b = derive_key("  arthur   MORGAN ", "red dead");
//! assert_eq!(a, b);
//! assert!(a.starts_with("char-"));
//! ```

use sha2::{Digest, Sha256};

use crate::models::CharacterRecord;

/// Prefix for keys derived from name and universe.
pub const DERIVED_KEY_PREFIX: &str = "char-";

const MAX_ID_LEN: usize = 128;

/// Bytes of the SHA-256 digest kept in a derived key (32 hex chars).
const DERIVED_KEY_BYTES: usize = 16;

/// Whether a source-assigned id can be used as an identity key as-is.
pub fn is_well_formed_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

/// Trim, collapse inner whitespace, and case-fold.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic key for a `(name, universe)` pair.
pub fn derive_key(name: &str, universe: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(name).as_bytes());
    // Unit separator keeps ("ab", "c") and ("a", "bc") apart.
    hasher.update([0x1f]);
    hasher.update(normalize_text(universe).as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..DERIVED_KEY_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("{}{}", DERIVED_KEY_PREFIX, hex)
}

/// Resolve the identity key of a candidate.
pub fn identity_key(record: &CharacterRecord) -> String {
    match record.id.as_deref().map(str::trim) {
        Some(id) if is_well_formed_id(id) => id.to_string(),
        _ => derive_key(&record.name, &record.universe),
    }
}

/// SHA-256 over the canonical JSON form of a record.
///
/// Maps in the record are ordered, so equal records always hash equally.
pub fn content_hash(record: &CharacterRecord) -> String {
    let json = serde_json::to_vec(record).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}
