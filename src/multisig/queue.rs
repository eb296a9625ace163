//! Payloads of transactions waiting for co-signers
//!
//! The queue owns the in-flight copy of each pending multisig transaction.
//! Signatures accepted by the collector land here; the copy is handed back
//! to the pool once it is ready.

use crate::core::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Status of a pending multisig transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PendingStatus {
    /// Waiting for more signatures
    Collecting,
    /// Enough signatures to be included in a block
    Ready,
}

/// A transaction pending signature collection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingMultisigPayload {
    pub transaction: Transaction,
    pub status: PendingStatus,
    /// Keys behind the accepted signatures, in the same order
    #[serde(default)]
    pub signers: Vec<String>,
    pub received_at: DateTime<Utc>,
    /// When the last signature arrived
    pub updated_at: DateTime<Utc>,
}

impl PendingMultisigPayload {
    pub fn new(transaction: Transaction) -> Self {
        let now = Utc::now();
        Self {
            transaction,
            status: PendingStatus::Collecting,
            signers: Vec::new(),
            received_at: now,
            updated_at: now,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == PendingStatus::Ready
    }

    pub fn has_signer(&self, public_key: &str) -> bool {
        self.signers.iter().any(|k| k == public_key)
    }
}

/// Pending payloads by transaction id
#[derive(Debug, Default)]
pub struct PendingSignatureQueue {
    payloads: RwLock<HashMap<String, PendingMultisigPayload>>,
}

impl PendingSignatureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a transaction; `false` if its id is already tracked
    pub async fn insert(&self, transaction: Transaction) -> bool {
        let mut payloads = self.payloads.write().await;
        if payloads.contains_key(&transaction.id) {
            return false;
        }
        payloads.insert(
            transaction.id.clone(),
            PendingMultisigPayload::new(transaction),
        );
        true
    }

    pub async fn get(&self, id: &str) -> Option<PendingMultisigPayload> {
        self.payloads.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.payloads.read().await.contains_key(id)
    }

    /// Give a group registration an empty signature list to collect into
    pub async fn init_signatures(&self, id: &str) {
        if let Some(payload) = self.payloads.write().await.get_mut(id) {
            payload.transaction.signatures.get_or_insert_with(Vec::new);
        }
    }

    /// Append an accepted signature and its signer, returning the updated
    /// transaction
    pub async fn append_signature(
        &self,
        id: &str,
        signature: &str,
        signer: &str,
    ) -> Option<Transaction> {
        let mut payloads = self.payloads.write().await;
        let payload = payloads.get_mut(id)?;
        payload.transaction.push_signature(signature.to_string());
        payload.signers.push(signer.to_string());
        payload.updated_at = Utc::now();
        Some(payload.transaction.clone())
    }

    pub async fn set_status(&self, id: &str, status: PendingStatus) {
        if let Some(payload) = self.payloads.write().await.get_mut(id) {
            payload.status = status;
        }
    }

    /// Ready transactions, oldest first
    pub async fn ready_transactions(&self) -> Vec<Transaction> {
        let payloads = self.payloads.read().await;
        let mut ready: Vec<_> = payloads.values().filter(|p| p.is_ready()).collect();
        ready.sort_by_key(|p| p.received_at);
        ready.into_iter().map(|p| p.transaction.clone()).collect()
    }

    /// Remove and return every ready transaction, oldest first
    pub async fn take_ready(&self) -> Vec<Transaction> {
        let mut payloads = self.payloads.write().await;
        let ids: Vec<String> = payloads
            .iter()
            .filter(|(_, p)| p.is_ready())
            .map(|(id, _)| id.clone())
            .collect();
        let mut ready: Vec<_> = ids.iter().filter_map(|id| payloads.remove(id)).collect();
        ready.sort_by_key(|p| p.received_at);
        ready.into_iter().map(|p| p.transaction).collect()
    }

    pub async fn remove(&self, id: &str) -> Option<PendingMultisigPayload> {
        self.payloads.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.payloads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
