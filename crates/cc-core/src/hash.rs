//! Hash helpers for the content classifier
//!
//! Index maps and URL tokens both use xxHash64. Token hashes are computed
//! over ASCII-lowercased bytes so that the compiler and the matcher agree
//! regardless of input case.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

use twox_hash::XxHash64;

/// Hash map keyed with xxHash64 instead of SipHash.
pub type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<XxHash64>>;

const TOKEN_SEED: u64 = 0x811c_9dc5;

/// Hash a URL token, lowercasing ASCII on the fly.
#[inline]
pub fn hash_token(token: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(TOKEN_SEED);
    for &b in token {
        hasher.write_u8(b.to_ascii_lowercase());
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_consistent() {
        assert_eq!(hash_token(b"tracker"), hash_token(b"tracker"));
    }

    #[test]
    fn test_hash_token_case_insensitive() {
        assert_eq!(hash_token(b"Analytics"), hash_token(b"analytics"));
    }

    #[test]
    fn test_hash_token_different_strings() {
        assert_ne!(hash_token(b"pixel"), hash_token(b"pixels"));
    }

    #[test]
    fn test_fast_map_borrowed_lookup() {
        let mut map: FastMap<Box<str>, u32> = FastMap::default();
        map.insert("tracker.example".into(), 7);
        assert_eq!(map.get("tracker.example"), Some(&7));
        assert_eq!(map.get("example"), None);
    }
}
