//! Content digesting: canonical bytes in, a [`Cid`] out.

use adir_core::Cid;
use sha2::{Digest, Sha256};

/// Digest already-canonicalized bytes into a [`Cid`]. Callers are expected
/// to have run the value through [`crate::canonicalize`] first — this
/// function does no canonicalization of its own, since it is also used to
/// digest non-JSON payloads (layer blobs).
pub fn digest_of(bytes: &[u8]) -> Cid {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest: [u8; 32] = hasher.finalize().into();
    Cid::from_sha256(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use serde_json::json;

    #[test]
    fn same_logical_value_digests_equal_regardless_of_key_order() {
        let a = canonicalize(&json!({"b": 1, "a": 2})).unwrap();
        let b = canonicalize(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(digest_of(&a), digest_of(&b));
    }

    #[test]
    fn different_bytes_digest_differently() {
        assert_ne!(digest_of(b"one"), digest_of(b"two"));
    }

    #[test]
    fn is_deterministic() {
        let bytes = b"stable input";
        assert_eq!(digest_of(bytes), digest_of(bytes));
    }
}
