//! Transaction processing pipeline
//!
//! [`TransactionLogic`] runs the checks and balance bookkeeping shared by
//! every type, consults the exception registry, and dispatches the
//! type-specific part through the registry.

use super::lifecycle::{AssetReader, DbSaveDescriptor, RawRow};
use super::registry::TransactionTypeRegistry;
use crate::config::ProtocolConstants;
use crate::core::{
    same_signature, Account, AccountDiff, Asset, ConfirmedTransaction, SignedBlock, Transaction,
    TransactionError, TransactionType,
};
use crate::crypto::SignatureVerifier;
use crate::exceptions::{ExceptionPoint, ExceptionRegistry};
use serde_json::{json, Map};
use std::collections::HashSet;
use std::sync::Arc;

const TRS_TABLE: &str = "trs";
const TRS_FIELDS: [&str; 13] = [
    "id",
    "blockId",
    "type",
    "timestamp",
    "senderPublicKey",
    "requesterPublicKey",
    "senderId",
    "recipientId",
    "amount",
    "fee",
    "signature",
    "signSignature",
    "signatures",
];

fn invalid(message: &str) -> TransactionError {
    TransactionError::InvalidTransaction(message.to_string())
}

pub struct TransactionLogic {
    registry: Arc<TransactionTypeRegistry>,
    exceptions: Arc<ExceptionRegistry>,
    verifier: Arc<dyn SignatureVerifier>,
    constants: ProtocolConstants,
}

impl TransactionLogic {
    pub fn new(
        registry: Arc<TransactionTypeRegistry>,
        exceptions: Arc<ExceptionRegistry>,
        verifier: Arc<dyn SignatureVerifier>,
        constants: ProtocolConstants,
    ) -> Self {
        Self {
            registry,
            exceptions,
            verifier,
            constants,
        }
    }

    pub fn registry(&self) -> &Arc<TransactionTypeRegistry> {
        &self.registry
    }

    pub fn calculate_fee(
        &self,
        tx: &Transaction,
        sender: &Account,
        height: u64,
    ) -> Result<u64, TransactionError> {
        Ok(self.registry.dispatch(tx.tx_type)?.calculate_fee(tx, sender, height))
    }

    pub fn ready(&self, tx: &Transaction, sender: &Account) -> Result<bool, TransactionError> {
        Ok(self.registry.dispatch(tx.tx_type)?.ready(tx, sender))
    }

    pub fn get_bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Result<Vec<u8>, TransactionError> {
        self.registry.get_bytes(tx, skip_signature, skip_second_signature)
    }

    pub fn get_id(&self, tx: &Transaction) -> Result<String, TransactionError> {
        self.registry.get_id(tx)
    }

    /// Check one signature against one key
    pub async fn verify_signature(&self, tx: &Transaction, public_key: &str, signature: &str) -> bool {
        self.verifier.verify(tx, public_key, signature).await
    }

    /// Structural validation of the envelope, then of the asset
    pub fn object_normalize(&self, tx: Transaction) -> Result<Transaction, TransactionError> {
        if hex::decode(&tx.sender_public_key).map_or(true, |key| key.is_empty()) {
            return Err(invalid("Invalid sender public key"));
        }
        if let Some(signatures) = &tx.signatures {
            let repeated = signatures
                .iter()
                .enumerate()
                .any(|(i, signature)| signatures[..i].iter().any(|s| same_signature(s, signature)));
            if repeated {
                return Err(invalid("Signatures must be unique"));
            }
        }
        self.registry.dispatch(tx.tx_type)?.object_normalize(tx)
    }

    /// Full semantic verification at `height`
    pub async fn verify(
        &self,
        tx: &Transaction,
        sender: &Account,
        height: u64,
    ) -> Result<(), TransactionError> {
        let handler = self.registry.dispatch(tx.tx_type)?;

        if let Some(key) = &sender.public_key {
            if *key != tx.sender_public_key {
                return Err(invalid("Invalid sender public key"));
            }
        }
        if tx.sender_address()? != sender.address {
            return Err(invalid("Invalid sender address"));
        }

        if let Some(requester) = &tx.requester_public_key {
            if !sender.co_signers().contains(requester) {
                return Err(invalid("Account does not belong to multisignature group"));
            }
        }

        if tx.id != self.registry.get_id(tx)? {
            return Err(invalid("Invalid transaction id"));
        }

        let expected = handler.calculate_fee(tx, sender, height);
        if tx.fee != expected {
            return Err(TransactionError::InvalidFee {
                expected,
                actual: tx.fee,
            });
        }

        if tx.amount > self.constants.total_amount {
            return Err(invalid("Invalid transaction amount"));
        }

        let signer = tx
            .requester_public_key
            .as_deref()
            .unwrap_or(&tx.sender_public_key);
        if !self.verifier.verify(tx, signer, &tx.signature).await {
            return Err(invalid("Failed to verify signature"));
        }

        self.verify_cosignatures(tx, sender).await?;

        handler.verify(tx, sender).await
    }

    /// Every co-signature must match some candidate key
    async fn verify_cosignatures(
        &self,
        tx: &Transaction,
        sender: &Account,
    ) -> Result<(), TransactionError> {
        let Some(signatures) = &tx.signatures else {
            return Ok(());
        };

        let mut candidates: Vec<String> = match &tx.asset.multisignature {
            Some(asset) if tx.is_multisig_registration() => {
                asset.keys().map(str::to_string).collect()
            }
            _ => sender
                .multisignatures
                .clone()
                .or_else(|| sender.u_multisignatures.clone())
                .unwrap_or_default(),
        };
        if tx.requester_public_key.is_some() {
            candidates.push(tx.sender_public_key.clone());
        }

        // each co-signature must come from a key no earlier one used
        let mut used: HashSet<&str> = HashSet::new();
        for (i, signature) in signatures.iter().enumerate() {
            if signatures[..i].iter().any(|s| same_signature(s, signature)) {
                return Err(invalid("Encountered duplicate signature in transaction"));
            }

            let mut signer = None;
            for key in &candidates {
                if tx.requester_public_key.as_ref() == Some(key) || used.contains(key.as_str()) {
                    continue;
                }
                if self.verifier.verify(tx, key, signature).await {
                    signer = Some(key.as_str());
                    break;
                }
            }
            match signer {
                Some(key) => {
                    used.insert(key);
                }
                None => return Err(invalid("Failed to verify multisignature")),
            }
        }

        Ok(())
    }

    pub async fn process(&self, tx: &Transaction, sender: &Account) -> Result<(), TransactionError> {
        self.registry.dispatch(tx.tx_type)?.process(tx, sender).await
    }

    /// Confirm a transaction: debit amount and fee, then run the type
    pub async fn apply(
        &self,
        tx: &ConfirmedTransaction,
        block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        let inner = &tx.transaction;
        if let Some(exception) = self.exceptions.find_handler(ExceptionPoint::TxApply, inner) {
            log::info!("Exception applied for transaction {}", inner.id);
            return exception.handle(inner, Some(block), sender);
        }

        let handler = self.registry.dispatch(inner.tx_type)?;
        if !handler.ready(inner, sender) {
            return Err(TransactionError::NotReady(inner.id.clone()));
        }

        let debit = inner.total_debit()? as i128;
        AccountDiff::confirmed(-debit).apply_to(sender)?;
        if let Err(e) = handler.apply(tx, block, sender).await {
            AccountDiff::confirmed(debit).apply_to(sender)?;
            return Err(e);
        }

        log::debug!("Applied {} transaction {}", inner.tx_type, inner.id);
        Ok(())
    }

    /// Exact inverse of [`apply`](Self::apply)
    pub async fn undo(
        &self,
        tx: &ConfirmedTransaction,
        block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        let inner = &tx.transaction;
        if let Some(exception) = self.exceptions.find_handler(ExceptionPoint::TxUndo, inner) {
            log::info!("Exception undone for transaction {}", inner.id);
            return exception.handle(inner, Some(block), sender);
        }

        let handler = self.registry.dispatch(inner.tx_type)?;
        let credit = inner.total_debit()? as i128;
        AccountDiff::confirmed(credit).apply_to(sender)?;
        if let Err(e) = handler.undo(tx, block, sender).await {
            AccountDiff::confirmed(-credit).apply_to(sender)?;
            return Err(e);
        }

        log::debug!("Undid {} transaction {}", inner.tx_type, inner.id);
        Ok(())
    }

    /// Reserve the debit against the unconfirmed balance
    pub async fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        if let Some(exception) = self
            .exceptions
            .find_handler(ExceptionPoint::TxApplyUnconfirmed, tx)
        {
            log::info!("Exception applied unconfirmed for transaction {}", tx.id);
            return exception.handle(tx, None, sender);
        }

        let handler = self.registry.dispatch(tx.tx_type)?;
        let debit = tx.total_debit()? as i128;
        AccountDiff::unconfirmed(-debit).apply_to(sender)?;
        if let Err(e) = handler.apply_unconfirmed(tx, sender).await {
            AccountDiff::unconfirmed(debit).apply_to(sender)?;
            return Err(e);
        }
        Ok(())
    }

    /// Exact inverse of [`apply_unconfirmed`](Self::apply_unconfirmed)
    pub async fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        if let Some(exception) = self
            .exceptions
            .find_handler(ExceptionPoint::TxUndoUnconfirmed, tx)
        {
            log::info!("Exception undone unconfirmed for transaction {}", tx.id);
            return exception.handle(tx, None, sender);
        }

        let handler = self.registry.dispatch(tx.tx_type)?;
        let credit = tx.total_debit()? as i128;
        AccountDiff::unconfirmed(credit).apply_to(sender)?;
        if let Err(e) = handler.undo_unconfirmed(tx, sender).await {
            AccountDiff::unconfirmed(-credit).apply_to(sender)?;
            return Err(e);
        }
        Ok(())
    }

    /// Rows to persist: the transaction record, then the type's asset
    pub fn db_save(
        &self,
        tx: &ConfirmedTransaction,
    ) -> Result<Vec<DbSaveDescriptor>, TransactionError> {
        let inner = &tx.transaction;
        let mut values = Map::new();
        values.insert("id".to_string(), json!(inner.id));
        values.insert("blockId".to_string(), json!(tx.block_id));
        values.insert("type".to_string(), json!(inner.tx_type.as_u8()));
        values.insert("timestamp".to_string(), json!(inner.timestamp));
        values.insert("senderPublicKey".to_string(), json!(inner.sender_public_key));
        values.insert("requesterPublicKey".to_string(), json!(inner.requester_public_key));
        values.insert("senderId".to_string(), json!(tx.sender_id));
        values.insert("recipientId".to_string(), json!(inner.recipient_id));
        values.insert("amount".to_string(), json!(inner.amount));
        values.insert("fee".to_string(), json!(inner.fee));
        values.insert("signature".to_string(), json!(inner.signature));
        values.insert("signSignature".to_string(), json!(inner.sign_signature));
        values.insert(
            "signatures".to_string(),
            json!(inner.signatures.as_ref().map(|s| s.join(","))),
        );

        let mut descriptors = vec![DbSaveDescriptor {
            table: TRS_TABLE,
            fields: TRS_FIELDS.to_vec(),
            values,
        }];
        if let Some(asset) = self.registry.dispatch(inner.tx_type)?.db_save(tx)? {
            descriptors.push(asset);
        }
        Ok(descriptors)
    }

    /// Asset of a stored transaction of `tx_type`
    pub fn db_read(
        &self,
        tx_type: TransactionType,
        raw: &RawRow,
    ) -> Result<Option<Asset>, TransactionError> {
        self.registry.dispatch(tx_type)?.db_read(raw)
    }

    pub async fn after_save(&self, tx: &Transaction) -> Result<(), TransactionError> {
        self.registry.dispatch(tx.tx_type)?.after_save(tx).await
    }

    pub async fn restore_asset(
        &self,
        tx: Transaction,
        reader: &dyn AssetReader,
    ) -> Result<Transaction, TransactionError> {
        let handler = self.registry.dispatch(tx.tx_type)?;
        handler.restore_asset(tx, reader).await
    }
}
