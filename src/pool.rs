//! Pending transaction pool
//!
//! The pool proper belongs to the surrounding node; the collector only reads
//! from it through [`TransactionPool`]. [`MemoryTransactionPool`] keeps
//! transactions by id in arrival order for tools and tests.

use crate::core::Transaction;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Default maximum pool transaction count
pub const DEFAULT_POOL_SIZE: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Transaction already exists")]
    DuplicateTransaction,
    #[error("Transaction has no id")]
    MissingId,
    #[error("Pool full")]
    PoolFull,
}

/// Lookup of transactions awaiting confirmation
#[async_trait]
pub trait TransactionPool: Send + Sync {
    async fn get_pending_transaction(&self, id: &str) -> Option<Transaction>;
}

#[derive(Debug, Default)]
struct PoolState {
    entries: HashMap<String, Transaction>,
    /// Ids in order of arrival
    by_time: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryTransactionPool {
    state: RwLock<PoolState>,
    max_size: usize,
}

impl MemoryTransactionPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            state: RwLock::new(PoolState::default()),
            max_size,
        }
    }

    pub async fn add(&self, tx: Transaction) -> Result<(), PoolError> {
        if tx.id.is_empty() {
            return Err(PoolError::MissingId);
        }
        let mut state = self.state.write().await;
        if state.entries.contains_key(&tx.id) {
            return Err(PoolError::DuplicateTransaction);
        }
        if state.entries.len() >= self.max_size {
            return Err(PoolError::PoolFull);
        }
        state.by_time.push(tx.id.clone());
        state.entries.insert(tx.id.clone(), tx);
        Ok(())
    }

    /// Replace a stored transaction, e.g. once it gathered its signatures
    pub async fn update(&self, tx: Transaction) -> bool {
        let mut state = self.state.write().await;
        match state.entries.get_mut(&tx.id) {
            Some(slot) => {
                *slot = tx;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &str) -> Option<Transaction> {
        let mut state = self.state.write().await;
        let removed = state.entries.remove(id)?;
        state.by_time.retain(|existing| existing != id);
        Some(removed)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.entries.contains_key(id)
    }

    /// Transactions in arrival order
    pub async fn transactions(&self) -> Vec<Transaction> {
        let state = self.state.read().await;
        state
            .by_time
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryTransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionPool for MemoryTransactionPool {
    async fn get_pending_transaction(&self, id: &str) -> Option<Transaction> {
        self.state.read().await.entries.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionType;

    fn tx(id: &str) -> Transaction {
        let mut tx = Transaction::new(TransactionType::Send, "aa", 0);
        tx.id = id.to_string();
        tx
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let pool = MemoryTransactionPool::new();
        assert!(pool.is_empty().await);

        pool.add(tx("1")).await.unwrap();
        pool.add(tx("2")).await.unwrap();
        assert_eq!(pool.add(tx("1")).await, Err(PoolError::DuplicateTransaction));
        assert_eq!(pool.add(tx("")).await, Err(PoolError::MissingId));

        assert!(pool.get_pending_transaction("1").await.is_some());
        assert!(pool.get_pending_transaction("3").await.is_none());
        let ids: Vec<_> = pool.transactions().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_capacity_and_removal() {
        let pool = MemoryTransactionPool::with_capacity(1);
        pool.add(tx("1")).await.unwrap();
        assert_eq!(pool.add(tx("2")).await, Err(PoolError::PoolFull));

        assert!(pool.remove("1").await.is_some());
        assert!(!pool.contains("1").await);
        assert!(pool.remove("1").await.is_none());
        pool.add(tx("2")).await.unwrap();
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_replaces_entry() {
        let pool = MemoryTransactionPool::new();
        pool.add(tx("1")).await.unwrap();

        let mut signed = tx("1");
        signed.push_signature("s".to_string());
        assert!(pool.update(signed).await);
        assert_eq!(
            pool.get_pending_transaction("1").await.unwrap().signature_count(),
            1
        );
        assert!(!pool.update(tx("9")).await);
    }
}
