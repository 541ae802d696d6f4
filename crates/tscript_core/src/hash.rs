//! Hasher (C2): SHA-256 over canonical bytes, hex-encoded.

use sha2::{Digest, Sha256};

use crate::canon::canonicalize;

/// Lowercase 64-char hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of the canonical form of `s` (UTF-8 bytes of `canonicalize(s)`).
///
/// All hashing, diffing, and hash-chain verification MUST operate on
/// canonicalized strings, so this is the entry point most callers want.
pub fn sha256_of_canonical(s: &str) -> String {
    sha256_hex(canonicalize(s).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_64() {
        let h = sha256_hex(b"hello");
        assert_eq!(h.len(), 64);
        assert!(h.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn deterministic() {
        let a = sha256_of_canonical("hello world");
        let b = sha256_of_canonical("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalizes_before_hashing() {
        // Trailing space difference should vanish after canonicalization.
        let a = sha256_of_canonical("hello \n");
        let b = sha256_of_canonical("hello\n");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
