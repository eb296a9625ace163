//! Multisignature signature collection
//!
//! [`MultisigCollector::process_signature`] accepts one co-signer signature
//! for a pending transaction. The existence check runs up front; everything
//! that reads or changes the payload runs as one unit on the shared balance
//! sequence, so concurrent submissions cannot interleave.

use super::queue::{PendingMultisigPayload, PendingSignatureQueue, PendingStatus};
use crate::core::{Account, AccountStore, Transaction, TransactionError};
use crate::crypto::SignatureVerifier;
use crate::events::{BusMessage, ChangeNotifier, EventBus};
use crate::logic::TransactionTypeRegistry;
use crate::pool::TransactionPool;
use crate::sequence::{Sequence, SequenceError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Coarse failure classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyPresent,
    VerificationFailed,
    Denied,
    Invalid,
    Unavailable,
}

/// Why a group registration refused a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The registration already carries its final signature list
    RegistrationFinalized,
    DuplicateSignature,
    /// The verifying member has already signed
    SignerAlreadySigned,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::RegistrationFinalized => f.write_str("registration finalized"),
            DenialReason::DuplicateSignature => f.write_str("duplicate signature"),
            DenialReason::SignerAlreadySigned => f.write_str("signer already signed"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MultisigError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Cannot find payload for such multisig transaction: {0}")]
    PayloadNotFound(String),
    #[error("Sender not found: {0}")]
    SenderNotFound(String),
    #[error("Signature already exists")]
    SignatureAlreadyExists,
    #[error("Permission to sign transaction denied")]
    PermissionDenied(DenialReason),
    #[error("Failed to verify signature")]
    VerificationFailed,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl MultisigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MultisigError::TransactionNotFound(_)
            | MultisigError::PayloadNotFound(_)
            | MultisigError::SenderNotFound(_) => ErrorKind::NotFound,
            MultisigError::SignatureAlreadyExists
            | MultisigError::PermissionDenied(DenialReason::DuplicateSignature) => {
                ErrorKind::AlreadyPresent
            }
            MultisigError::PermissionDenied(
                DenialReason::RegistrationFinalized | DenialReason::SignerAlreadySigned,
            ) => ErrorKind::Denied,
            MultisigError::VerificationFailed => ErrorKind::VerificationFailed,
            MultisigError::Transaction(_) => ErrorKind::Invalid,
            MultisigError::Sequence(_) => ErrorKind::Unavailable,
        }
    }
}

/// Result of an accepted signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReceipt {
    pub transaction_id: String,
    /// Key the signature verified against
    pub signer: String,
    pub signature_count: usize,
    pub ready: bool,
}

/// Collects co-signer signatures for pending transactions
#[derive(Clone)]
pub struct MultisigCollector {
    pool: Arc<dyn TransactionPool>,
    accounts: Arc<dyn AccountStore>,
    verifier: Arc<dyn SignatureVerifier>,
    registry: Arc<TransactionTypeRegistry>,
    bus: Arc<dyn EventBus>,
    notifier: Arc<dyn ChangeNotifier>,
    balances: Sequence,
    queue: Arc<PendingSignatureQueue>,
}

impl MultisigCollector {
    /// `balances` is the sequence every balance-affecting operation shares
    pub fn new(
        pool: Arc<dyn TransactionPool>,
        accounts: Arc<dyn AccountStore>,
        verifier: Arc<dyn SignatureVerifier>,
        registry: Arc<TransactionTypeRegistry>,
        bus: Arc<dyn EventBus>,
        notifier: Arc<dyn ChangeNotifier>,
        balances: Sequence,
    ) -> Self {
        Self {
            pool,
            accounts,
            verifier,
            registry,
            bus,
            notifier,
            balances,
            queue: Arc::new(PendingSignatureQueue::new()),
        }
    }

    /// Start collecting signatures for a pool transaction
    pub async fn add_pending(&self, tx: Transaction) -> bool {
        let id = tx.id.clone();
        let added = self.queue.insert(tx).await;
        if added {
            log::debug!("Collecting signatures for transaction {}", id);
        }
        added
    }

    pub async fn payload(&self, id: &str) -> Option<PendingMultisigPayload> {
        self.queue.get(id).await
    }

    pub async fn ready_transactions(&self) -> Vec<Transaction> {
        self.queue.ready_transactions().await
    }

    /// Hand ready transactions back for confirmation
    pub async fn take_ready(&self) -> Vec<Transaction> {
        self.queue.take_ready().await
    }

    pub async fn remove(&self, id: &str) -> Option<PendingMultisigPayload> {
        self.queue.remove(id).await
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    /// Accept one co-signer signature for a pending transaction
    pub async fn process_signature(
        &self,
        signature: &str,
        transaction_id: &str,
    ) -> Result<SignatureReceipt, MultisigError> {
        let tx = self
            .pool
            .get_pending_transaction(transaction_id)
            .await
            .ok_or_else(|| MultisigError::TransactionNotFound(transaction_id.to_string()))?;

        if tx.is_multisig_registration() {
            self.queue.init_signatures(transaction_id).await;
        }

        let collector = self.clone();
        let signature = signature.to_string();
        let id = transaction_id.to_string();
        let receipt = self
            .balances
            .add_and_promise(async move { collector.sign_in_sequence(&id, &signature).await })
            .await??;
        Ok(receipt)
    }

    async fn sign_in_sequence(
        &self,
        id: &str,
        signature: &str,
    ) -> Result<SignatureReceipt, MultisigError> {
        // The pool may have dropped the transaction while this unit waited
        let Some(tx) = self.pool.get_pending_transaction(id).await else {
            if self.queue.remove(id).await.is_some() {
                log::debug!("Dropped payload of evicted transaction {}", id);
            }
            return Err(MultisigError::TransactionNotFound(id.to_string()));
        };

        let payload = self
            .queue
            .get(id)
            .await
            .ok_or_else(|| MultisigError::PayloadNotFound(id.to_string()))?;

        let address = tx
            .sender_address()
            .map_err(|_| MultisigError::SenderNotFound(tx.sender_public_key.clone()))?;
        let sender = self
            .accounts
            .get_account(&address)
            .await
            .ok_or_else(|| MultisigError::SenderNotFound(address.clone()))?;

        let was_ready = payload.is_ready();
        let pending = payload.transaction;
        let registration = pending.is_multisig_registration();
        let signer = if registration {
            self.process_multisig_signature(&pending, signature).await?
        } else {
            self.process_normal_tx_signature(&pending, signature, &sender)
                .await?
        };

        // one signature per key
        if payload.signers.contains(&signer) {
            log::warn!("Rejected second signature by {} for {}", signer, id);
            return Err(if registration {
                MultisigError::PermissionDenied(DenialReason::SignerAlreadySigned)
            } else {
                MultisigError::SignatureAlreadyExists
            });
        }

        let updated = self
            .queue
            .append_signature(id, signature, &signer)
            .await
            .ok_or_else(|| MultisigError::PayloadNotFound(id.to_string()))?;

        if !updated.is_multisig_registration() {
            self.notifier
                .notify_transaction_signature_change(&updated)
                .await;
        }

        let ready = self.registry.dispatch(updated.tx_type)?.ready(&updated, &sender);
        if ready && !was_ready {
            log::info!(
                "Transaction {} is ready with {} signatures",
                id,
                updated.signature_count()
            );
        }
        let status = if ready {
            PendingStatus::Ready
        } else {
            PendingStatus::Collecting
        };
        self.queue.set_status(id, status).await;

        self.bus
            .publish(
                BusMessage::Signature {
                    transaction_id: id.to_string(),
                    signature: signature.to_string(),
                },
                true,
            )
            .await;

        log::debug!("Accepted signature for {} from {}", id, signer);
        Ok(SignatureReceipt {
            transaction_id: id.to_string(),
            signer,
            signature_count: updated.signature_count(),
            ready,
        })
    }

    /// Signature for a group registration: any group member may sign once
    async fn process_multisig_signature(
        &self,
        tx: &Transaction,
        signature: &str,
    ) -> Result<String, MultisigError> {
        let asset = tx.asset.multisignature.as_ref().ok_or_else(|| {
            TransactionError::InvalidAsset("Invalid transaction asset".to_string())
        })?;
        if asset.signatures.is_some() {
            return Err(MultisigError::PermissionDenied(
                DenialReason::RegistrationFinalized,
            ));
        }
        if tx.has_signature(signature) {
            return Err(MultisigError::PermissionDenied(
                DenialReason::DuplicateSignature,
            ));
        }

        self.first_verifying_key(tx, asset.keys(), signature).await
    }

    /// Signature for a transaction from a multisig account
    async fn process_normal_tx_signature(
        &self,
        tx: &Transaction,
        signature: &str,
        sender: &Account,
    ) -> Result<String, MultisigError> {
        if tx.has_signature(signature) {
            return Err(MultisigError::SignatureAlreadyExists);
        }

        let requester = tx
            .requester_public_key
            .as_ref()
            .map(|_| tx.sender_public_key.as_str());
        let candidates = sender
            .co_signers()
            .iter()
            .map(String::as_str)
            .chain(requester);

        self.first_verifying_key(tx, candidates, signature).await
    }

    /// Try candidates in order, stopping at the first match
    async fn first_verifying_key<'a>(
        &self,
        tx: &Transaction,
        candidates: impl Iterator<Item = &'a str>,
        signature: &str,
    ) -> Result<String, MultisigError> {
        for key in candidates {
            if self.verifier.verify(tx, key, signature).await {
                return Ok(key.to_string());
            }
        }
        Err(MultisigError::VerificationFailed)
    }
}
