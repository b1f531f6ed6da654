//! Canonical fingerprints for Molecule and Result dedup keys.
//!
//! The exact canonicalization (symmetry folding, atom reordering, geometry
//! tolerance, ...) is defined by an external chemistry library and consumed
//! here only as a pure-function contract: equivalent representations must
//! hash equal, and a hash match that turns out not to
//! be a genuine match must be distinguishable from a true duplicate. This
//! crate ships a deterministic reference implementation of that contract so
//! the core store is buildable and testable standalone; production
//! deployments plug in the real chemistry library's [`MoleculeHasher`].
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use fractal_types::JsonValue;
use sha2::{Digest, Sha256};

/// The canonicalization contract the Store depends on.
///
/// `hash` MUST be a pure function of `payload`: equal canonical structures
/// hash equal regardless of incidental differences (key order, floating
/// point representation of an otherwise-identical value, and so on).
/// `compare` distinguishes a genuine duplicate from a hash collision —
/// two payloads that hash equal but are not actually the same structure.
pub trait MoleculeHasher: std::fmt::Debug + Send + Sync {
    /// Computes the canonical fingerprint of a molecule payload.
    fn hash(&self, payload: &JsonValue) -> String;

    /// Returns whether two payloads are genuinely the same structure. Only
    /// meaningful to call when `hash(a) == hash(b)`; the Store uses it
    /// exactly there, to guard against a hash collision.
    fn compare(&self, a: &JsonValue, b: &JsonValue) -> bool;
}

/// A reference [`MoleculeHasher`]: canonicalizes a JSON payload by sorting
/// object keys recursively (so field order never affects the hash), then
/// hashes the canonical serialization with SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalHasher;

impl CanonicalHasher {
    pub fn new() -> Self {
        Self
    }

    /// Produces a serialization where every object's keys are sorted, so
    /// that two structurally-equal payloads serialize identically
    /// regardless of the order their fields were constructed in.
    fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serde_json::Map::new();
                for (k, v) in entries {
                    out.insert(k.clone(), Self::canonicalize(v));
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::canonicalize).collect())
            }
            other => other.clone(),
        }
    }
}

impl MoleculeHasher for CanonicalHasher {
    fn hash(&self, payload: &JsonValue) -> String {
        let canonical = Self::canonicalize(payload.inner());
        // `to_string` on a `serde_json::Value` built purely from sorted
        // maps is deterministic: the same logical structure always
        // produces the same bytes.
        let bytes = canonical.to_string();
        let digest = Sha256::digest(bytes.as_bytes());
        format!("{:x}", digest)
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> bool {
        Self::canonicalize(a.inner()) == Self::canonicalize(b.inner())
    }
}

/// Computes the canonical hash of a payload using the reference hasher.
/// Convenience wrapper for callers (like `fractal_store`) that don't need
/// to plug in a different chemistry library.
pub fn compute_hash(payload: &JsonValue) -> String {
    CanonicalHasher.hash(payload)
}

/// Compares two payloads for genuine equality using the reference hasher.
pub fn compare(a: &JsonValue, b: &JsonValue) -> bool {
    CanonicalHasher.compare(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_under_key_reordering() {
        let a = JsonValue::from(json!({"symbols": ["O", "H", "H"], "geometry": [0.0, 0.0, 0.0]}));
        let b = JsonValue::from(json!({"geometry": [0.0, 0.0, 0.0], "symbols": ["O", "H", "H"]}));
        assert_eq!(compute_hash(&a), compute_hash(&b));
        assert!(compare(&a, &b));
    }

    #[test]
    fn differing_payloads_hash_differently() {
        let a = JsonValue::from(json!({"symbols": ["O", "H", "H"]}));
        let b = JsonValue::from(json!({"symbols": ["N", "H", "H", "H"]}));
        assert_ne!(compute_hash(&a), compute_hash(&b));
        assert!(!compare(&a, &b));
    }

    #[test]
    fn nested_arrays_are_canonicalized_too() {
        let a = JsonValue::from(json!({"meta": {"b": 1, "a": 2}, "list": [{"y": 1, "x": 2}]}));
        let b = JsonValue::from(json!({"meta": {"a": 2, "b": 1}, "list": [{"x": 2, "y": 1}]}));
        assert!(compare(&a, &b));
    }
}
