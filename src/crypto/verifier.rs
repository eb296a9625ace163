//! Co-signer signature verification

use crate::core::Transaction;
use crate::logic::TransactionTypeRegistry;
use async_trait::async_trait;
use std::sync::Arc;

use super::keys::{public_key_from_hex, verify_signature};

/// Checks a single co-signer signature against a candidate key
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// `false` on any mismatch or malformed input
    async fn verify(&self, tx: &Transaction, public_key: &str, signature: &str) -> bool;
}

/// secp256k1 verification over the transaction signing digest
pub struct Secp256k1SignatureVerifier {
    registry: Arc<TransactionTypeRegistry>,
}

impl Secp256k1SignatureVerifier {
    pub fn new(registry: Arc<TransactionTypeRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl SignatureVerifier for Secp256k1SignatureVerifier {
    async fn verify(&self, tx: &Transaction, public_key: &str, signature: &str) -> bool {
        let digest = match self.registry.signing_digest(tx) {
            Ok(digest) => digest,
            Err(e) => {
                log::debug!("Cannot compute digest for {}: {}", tx.id, e);
                return false;
            }
        };
        let Ok(key) = public_key_from_hex(public_key) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        verify_signature(&key, &digest, &signature).unwrap_or(false)
    }
}
