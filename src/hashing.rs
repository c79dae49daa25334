//! Deterministic hashing. The hashing data structures in the standard library are randomly
//! seeded, which would make iteration order (and therefore random draws) differ between runs.
//! We re-export the `rustc-hash` variants instead, and use `xxh3` to derive seeds for random
//! sub-streams.
//!
//! `HashMap<K, V, S>` does not have a `new` method. Use `HashMap::default()` instead.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use xxhash_rust::xxh3::xxh3_64;

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

/// Hashes a label together with a sequence of integers, e.g. a stream name, a day and an agent.
pub fn hash_key(label: &str, parts: &[u64]) -> u64 {
    let mut bytes = Vec::with_capacity(label.len() + 8 * parts.len());
    bytes.extend_from_slice(label.as_bytes());
    for part in parts {
        bytes.extend_from_slice(&part.to_le_bytes());
    }
    xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_strings() {
        assert_eq!(hash_str("hello"), hash_str("hello"));
        assert_ne!(hash_str("hello"), hash_str("world"));
    }

    #[test]
    fn key_hash_depends_on_every_part() {
        let a = hash_key("transition", &[3, 17]);
        assert_eq!(a, hash_key("transition", &[3, 17]));
        assert_ne!(a, hash_key("transition", &[17, 3]));
        assert_ne!(a, hash_key("testing", &[3, 17]));
    }
}
