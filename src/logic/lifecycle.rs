//! The transaction lifecycle contract
//!
//! Every transaction type implements [`TransactionLifecycle`] exactly once.
//! Callers never depend on a concrete type: they dispatch through the
//! [`TransactionTypeRegistry`](crate::logic::TransactionTypeRegistry).

use crate::core::{Account, Asset, ConfirmedTransaction, SignedBlock, Transaction, TransactionError, TransactionType};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A raw storage row, column name to value
pub type RawRow = Map<String, Value>;

/// Where and how a type persists its asset
#[derive(Debug, Clone, PartialEq)]
pub struct DbSaveDescriptor {
    pub table: &'static str,
    pub fields: Vec<&'static str>,
    /// One value per field, keyed by field name
    pub values: Map<String, Value>,
}

/// Reads asset rows that live outside the primary transaction record
#[async_trait]
pub trait AssetReader: Send + Sync {
    async fn read_rows(
        &self,
        table: &str,
        transaction_id: &str,
    ) -> Result<Vec<RawRow>, TransactionError>;
}

/// Threshold rule shared by block inclusion and signature collection.
///
/// A transaction from a multisig account is ready once it carries at least
/// `multimin` co-signatures; transactions from other accounts are always
/// ready.
pub fn threshold_ready(tx: &Transaction, sender: &Account) -> bool {
    if !sender.is_multisig() {
        return true;
    }
    match &tx.signatures {
        Some(signatures) => signatures.len() >= sender.multimin as usize,
        None => false,
    }
}

/// Per-type behavior surface
///
/// Methods without a default (`calculate_fee`, `get_bytes`,
/// `object_normalize`, `db_read`, `db_save`) define the type's identity on
/// the wire and in storage, so every type must spell them out.
#[async_trait]
pub trait TransactionLifecycle: Send + Sync {
    /// Tag this handler is registered under
    fn tx_type(&self) -> TransactionType;

    /// Fee owed at `height`
    fn calculate_fee(&self, tx: &Transaction, sender: &Account, height: u64) -> u64;

    /// Semantic checks before a transaction is accepted
    async fn verify(&self, _tx: &Transaction, _sender: &Account) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Side-effectful hook run before `apply`
    async fn process(&self, _tx: &Transaction, _sender: &Account) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Type-specific asset bytes inside the canonical encoding
    fn get_bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Result<Vec<u8>, TransactionError>;

    /// Confirmed state mutation for inclusion in `block`
    async fn apply(
        &self,
        _tx: &ConfirmedTransaction,
        _block: &SignedBlock,
        _sender: &mut Account,
    ) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Reserve state before confirmation
    async fn apply_unconfirmed(
        &self,
        _tx: &Transaction,
        _sender: &mut Account,
    ) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Exact inverse of `apply`
    async fn undo(
        &self,
        _tx: &ConfirmedTransaction,
        _block: &SignedBlock,
        _sender: &mut Account,
    ) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Exact inverse of `apply_unconfirmed`
    async fn undo_unconfirmed(
        &self,
        _tx: &Transaction,
        _sender: &mut Account,
    ) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Strict structural validation of the asset
    fn object_normalize(&self, tx: Transaction) -> Result<Transaction, TransactionError>;

    /// Rebuild the asset from a storage row; `None` when the row has none
    fn db_read(&self, raw: &RawRow) -> Result<Option<Asset>, TransactionError>;

    /// Persistence descriptor for the asset; `None` when nothing is stored
    fn db_save(
        &self,
        tx: &ConfirmedTransaction,
    ) -> Result<Option<DbSaveDescriptor>, TransactionError>;

    /// Runs after the transaction has been persisted
    async fn after_save(&self, _tx: &Transaction) -> Result<(), TransactionError> {
        Ok(())
    }

    /// Complete an asset spread over several records
    async fn restore_asset(
        &self,
        tx: Transaction,
        _reader: &dyn AssetReader,
    ) -> Result<Transaction, TransactionError> {
        Ok(tx)
    }

    /// Whether enough co-signatures are present to proceed
    fn ready(&self, tx: &Transaction, sender: &Account) -> bool {
        threshold_ready(tx, sender)
    }
}
