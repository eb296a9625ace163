//! Transaction type registry
//!
//! Maps each type tag to its lifecycle handler. Canonical bytes, ids and the
//! co-signer digest are computed here because they combine the shared
//! envelope with the handler's asset bytes.

use super::bytes;
use super::lifecycle::TransactionLifecycle;
use super::types::{MultisignatureTransaction, SendTransaction};
use crate::config::ProtocolConstants;
use crate::core::{AccountLedger, Transaction, TransactionError, TransactionType};
use crate::crypto::{id_from_bytes, sha256, KeyPair};
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers keyed by transaction type
#[derive(Default)]
pub struct TransactionTypeRegistry {
    handlers: HashMap<TransactionType, Arc<dyn TransactionLifecycle>>,
}

impl TransactionTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in type wired to `constants`
    pub fn with_builtin_types(
        constants: &ProtocolConstants,
        ledger: Arc<dyn AccountLedger>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SendTransaction::new(constants.fees.clone(), ledger)));
        registry.register(Arc::new(MultisignatureTransaction::new(
            constants.fees.clone(),
            constants.multisig_constraints,
        )));
        registry
    }

    /// Register a handler under its own tag, returning the one it replaced
    pub fn register(
        &mut self,
        handler: Arc<dyn TransactionLifecycle>,
    ) -> Option<Arc<dyn TransactionLifecycle>> {
        let tx_type = handler.tx_type();
        log::debug!("Registering handler for {} transactions", tx_type);
        self.handlers.insert(tx_type, handler)
    }

    /// Handler for a type, or `UnknownTransactionType`
    pub fn dispatch(
        &self,
        tx_type: TransactionType,
    ) -> Result<&Arc<dyn TransactionLifecycle>, TransactionError> {
        self.handlers
            .get(&tx_type)
            .ok_or(TransactionError::UnknownTransactionType(tx_type.as_u8()))
    }

    pub fn contains(&self, tx_type: TransactionType) -> bool {
        self.handlers.contains_key(&tx_type)
    }

    /// Registered tags in ascending order
    pub fn registered_types(&self) -> Vec<TransactionType> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Canonical bytes of a transaction
    pub fn get_bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Result<Vec<u8>, TransactionError> {
        let asset = self
            .dispatch(tx.tx_type)?
            .get_bytes(tx, skip_signature, skip_second_signature)?;
        bytes::encode(tx, &asset, skip_signature, skip_second_signature)
    }

    /// Content id over the fully signed encoding
    pub fn get_id(&self, tx: &Transaction) -> Result<String, TransactionError> {
        Ok(id_from_bytes(&self.get_bytes(tx, false, false)?))
    }

    /// Digest every signer commits to
    pub fn signing_digest(&self, tx: &Transaction) -> Result<Vec<u8>, TransactionError> {
        Ok(sha256(&self.get_bytes(tx, true, true)?))
    }

    /// Sign the transaction digest, hex-encoded
    pub fn sign(&self, tx: &Transaction, key_pair: &KeyPair) -> Result<String, TransactionError> {
        Ok(key_pair.sign_hex(&self.signing_digest(tx)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MemoryAccountStore, MultisignatureAsset};

    fn registry() -> TransactionTypeRegistry {
        TransactionTypeRegistry::with_builtin_types(
            &ProtocolConstants::default(),
            Arc::new(MemoryAccountStore::new()),
        )
    }

    #[test]
    fn test_builtin_types() {
        let registry = registry();
        assert_eq!(
            registry.registered_types(),
            vec![TransactionType::Send, TransactionType::Multi]
        );
        assert!(registry.dispatch(TransactionType::Send).is_ok());
    }

    #[test]
    fn test_unregistered_type_is_unknown() {
        let registry = registry();
        assert!(matches!(
            registry.dispatch(TransactionType::Vote),
            Err(TransactionError::UnknownTransactionType(3))
        ));

        let tx = Transaction::new(TransactionType::Delegate, "aa", 0);
        assert_eq!(
            registry.get_bytes(&tx, true, true),
            Err(TransactionError::UnknownTransactionType(2))
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = registry();
        let replaced = registry.register(Arc::new(MultisignatureTransaction::new(
            Default::default(),
            Default::default(),
        )));
        assert!(replaced.is_some());
        assert_eq!(registry.registered_types().len(), 2);
    }

    #[test]
    fn test_id_ignores_cosigner_signatures() {
        let registry = registry();
        let kp = KeyPair::generate();
        let mut tx = Transaction::new(TransactionType::Multi, &kp.public_key_hex(), 5);
        tx.asset.multisignature = Some(MultisignatureAsset {
            min: 1,
            lifetime: 24,
            keysgroup: vec![format!("+{}", KeyPair::generate().public_key_hex())],
            signatures: None,
        });
        tx.signature = registry.sign(&tx, &kp).unwrap();

        let id = registry.get_id(&tx).unwrap();
        assert!(id.parse::<u64>().is_ok());

        tx.push_signature("ff".to_string());
        assert_eq!(registry.get_id(&tx).unwrap(), id);
    }

    #[test]
    fn test_digest_ignores_signatures() {
        let registry = registry();
        let mut tx = Transaction::new(TransactionType::Send, "aa", 5);
        tx.recipient_id = Some("1R".to_string());
        let before = registry.signing_digest(&tx).unwrap();

        tx.signature = "0101".to_string();
        tx.sign_signature = Some("0202".to_string());
        assert_eq!(registry.signing_digest(&tx).unwrap(), before);
        assert_eq!(before.len(), 32);
    }
}
