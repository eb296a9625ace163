//! Cryptographic utilities
//!
//! - SHA-256 hashing and 64-bit id derivation
//! - secp256k1 key management
//! - The signature verifier consumed by the multisignature collector

pub mod hash;
pub mod keys;
pub mod verifier;

pub use hash::{digest_to_u64, id_from_bytes, sha256, sha256_hex};
pub use keys::{
    address_from_public_key_hex, public_key_from_hex, sign_message, verify_signature, KeyError,
    KeyPair,
};
pub use verifier::{Secp256k1SignatureVerifier, SignatureVerifier};
