//
// surrogate.rs
// Lab-Deidentify-rs
//
// Hash primitives behind every surrogate value: a salted SHA-256 prefix for identifiers and a fixed FNV-1a bucket for names.
//
// Thales Matheus Mendonça Santos - October 2026

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the salted digest.
pub const DIGEST_LEN: usize = 12;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Lowercase hex of `sha256(value || salt)`, truncated to [`DIGEST_LEN`].
pub fn salted_digest(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// `prefix` followed by the salted digest of `value`, e.g. `PT1a2b3c4d5e6f`.
pub fn hashed_id(prefix: &str, value: &str, salt: &str) -> String {
    format!("{}{}", prefix, salted_digest(value, salt))
}

/// 64-bit FNV-1a over the UTF-8 bytes of `value`.
pub fn fnv1a64(value: &str) -> u64 {
    value.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Coarse name placeholder: `label` followed by a bucket in `0..modulus`.
/// Distinct names may share a bucket.
pub fn name_bucket(label: &str, value: &str, modulus: u64) -> String {
    format!("{}{}", label, fnv1a64(value) % modulus)
}
