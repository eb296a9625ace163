//! Hashing utilities
//!
//! SHA-256 digests plus the 64-bit identifier derivation shared by
//! transaction ids and account addresses.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Folds a digest into a 64-bit identifier.
///
/// The first eight bytes of the digest are reversed and read big-endian,
/// which is the layout every node uses for ids and addresses.
pub fn digest_to_u64(digest: &[u8]) -> u64 {
    let mut head = [0u8; 8];
    for (i, byte) in digest.iter().take(8).enumerate() {
        head[7 - i] = *byte;
    }
    u64::from_be_bytes(head)
}

/// Decimal identifier for arbitrary bytes (`sha256` then [`digest_to_u64`])
pub fn id_from_bytes(data: &[u8]) -> String {
    digest_to_u64(&sha256(data)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256_hex(b"hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_digest_to_u64_reverses_head() {
        let digest = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(digest_to_u64(&digest), 0x0807060504030201);
    }

    #[test]
    fn test_id_is_deterministic() {
        assert_eq!(id_from_bytes(b"tx"), id_from_bytes(b"tx"));
        assert_ne!(id_from_bytes(b"tx"), id_from_bytes(b"tx2"));
    }
}
