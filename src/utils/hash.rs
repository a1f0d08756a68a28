//! Deterministic 64-bit hashing.
//!
//! Cache filenames under `.wu-cache/` are derived from path hashes and must
//! be identical across process restarts, so this module uses blake3 rather
//! than `DefaultHasher` (random seed per process) or `FxHasher` (fast but
//! not guaranteed stable across versions).

/// Hash a byte slice to u64 (first 8 bytes of blake3, little-endian).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
}

/// Hash a string to u64.
#[inline]
pub fn hash_str(s: &str) -> u64 {
    hash_bytes(s.as_bytes())
}

/// Format a 64-bit hash as 16 lowercase hex chars (cache filename stem).
#[inline]
pub fn hex64(h: u64) -> String {
    format!("{h:016x}")
}

// =============================================================================
// Tests
// =============================================================================
