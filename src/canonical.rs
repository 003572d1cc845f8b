//! Canonical serialization for deterministic fingerprints.
//!
//! Kept-line maps and configurations are fingerprinted by hashing their
//! canonical JSON form with xxh64, so two runs over the same translation unit
//! can be compared by a single 16-digit hex string.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Maps are `BTreeMap`/`BTreeSet`, so keys serialize sorted
//! - Line flags serialize in line order

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
///
/// Only called on values built from strings, integers, booleans and ordered
/// collections, whose serialization cannot fail.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
