//! Account snapshots and the account store collaborator
//!
//! Account storage is owned by the surrounding node. This module defines the
//! snapshot the lifecycle mutates, the read/merge interfaces it consumes, and
//! an in-memory store used by tools and tests.

use crate::core::transaction::TransactionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

// =============================================================================
// Account
// =============================================================================

/// Account state as seen by the transaction lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Confirmed balance
    pub balance: u64,
    /// Balance left after unconfirmed transactions reserve their debit
    #[serde(rename = "u_balance")]
    pub u_balance: u64,
    /// Co-signer keys; absent or empty when the account is not multisig
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisignatures: Option<Vec<String>>,
    /// Signatures required for a multisig transaction
    pub multimin: u32,
    pub multilifetime: u32,
    #[serde(default, rename = "u_multisignatures", skip_serializing_if = "Option::is_none")]
    pub u_multisignatures: Option<Vec<String>>,
    #[serde(default, rename = "u_multimin")]
    pub u_multimin: u32,
    #[serde(default, rename = "u_multilifetime")]
    pub u_multilifetime: u32,
}

impl Account {
    /// Create an empty account
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style public key
    pub fn with_public_key(mut self, public_key: &str) -> Self {
        self.public_key = Some(public_key.to_string());
        self
    }

    /// Builder-style balance, confirmed and unconfirmed alike
    pub fn with_balance(mut self, balance: u64) -> Self {
        self.balance = balance;
        self.u_balance = balance;
        self
    }

    /// Builder-style multisignature group, confirmed and unconfirmed alike
    pub fn with_multisignatures(mut self, keys: Vec<String>, min: u32, lifetime: u32) -> Self {
        self.u_multisignatures = Some(keys.clone());
        self.multisignatures = Some(keys);
        self.multimin = min;
        self.u_multimin = min;
        self.multilifetime = lifetime;
        self.u_multilifetime = lifetime;
        self
    }

    /// Co-signer keys in their stored order
    pub fn co_signers(&self) -> &[String] {
        self.multisignatures.as_deref().unwrap_or(&[])
    }

    /// Whether the account is controlled by a multisignature group
    pub fn is_multisig(&self) -> bool {
        !self.co_signers().is_empty()
    }

    /// Whether an unconfirmed group registration is pending or active
    pub fn is_unconfirmed_multisig(&self) -> bool {
        self.u_multisignatures
            .as_ref()
            .map_or(false, |keys| !keys.is_empty())
    }
}

/// Balance deltas merged into a stored account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountDiff {
    pub balance: i128,
    pub u_balance: i128,
}

impl AccountDiff {
    /// Same delta on both balances
    pub fn both(delta: i128) -> Self {
        Self {
            balance: delta,
            u_balance: delta,
        }
    }

    pub fn confirmed(delta: i128) -> Self {
        Self {
            balance: delta,
            u_balance: 0,
        }
    }

    pub fn unconfirmed(delta: i128) -> Self {
        Self {
            balance: 0,
            u_balance: delta,
        }
    }

    /// Apply the deltas to an account snapshot
    pub fn apply_to(&self, account: &mut Account) -> Result<(), TransactionError> {
        let balance = apply_delta(&account.address, account.balance, self.balance)?;
        let u_balance = apply_delta(&account.address, account.u_balance, self.u_balance)?;
        account.balance = balance;
        account.u_balance = u_balance;
        Ok(())
    }
}

fn apply_delta(address: &str, value: u64, delta: i128) -> Result<u64, TransactionError> {
    let next = value as i128 + delta;
    u64::try_from(next).map_err(|_| TransactionError::InsufficientBalance {
        address: address.to_string(),
        required: delta.unsigned_abs().min(u64::MAX as u128) as u64,
        available: value,
    })
}

// =============================================================================
// Collaborator Interfaces
// =============================================================================

/// Read access to account snapshots
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an account by address
    async fn get_account(&self, address: &str) -> Option<Account>;
}

/// Write access used by transaction types that touch accounts other than
/// the sender
#[async_trait]
pub trait AccountLedger: AccountStore {
    /// Merge balance deltas into an account, creating it when absent
    async fn merge(&self, address: &str, diff: AccountDiff) -> Result<Account, TransactionError>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Account store backed by a map
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account snapshot
    pub async fn put(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.address.clone(), account);
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_account(&self, address: &str) -> Option<Account> {
        self.accounts.read().await.get(address).cloned()
    }
}

#[async_trait]
impl AccountLedger for MemoryAccountStore {
    async fn merge(&self, address: &str, diff: AccountDiff) -> Result<Account, TransactionError> {
        let mut accounts = self.accounts.write().await;
        let mut account = accounts
            .get(address)
            .cloned()
            .unwrap_or_else(|| Account::new(address));
        diff.apply_to(&mut account)?;
        accounts.insert(address.to_string(), account.clone());
        Ok(account)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multisig_detection() {
        let plain = Account::new("1R");
        assert!(!plain.is_multisig());

        let mut empty = Account::new("2R");
        empty.multisignatures = Some(vec![]);
        assert!(!empty.is_multisig());

        let group = Account::new("3R").with_multisignatures(vec!["k1".into()], 1, 24);
        assert!(group.is_multisig());
        assert!(group.is_unconfirmed_multisig());
        assert_eq!(group.co_signers(), &["k1".to_string()]);
    }

    #[test]
    fn test_diff_rejects_negative_balance() {
        let mut account = Account::new("1R").with_balance(10);
        assert!(AccountDiff::both(-5).apply_to(&mut account).is_ok());
        assert_eq!(account.balance, 5);

        let err = AccountDiff::confirmed(-6).apply_to(&mut account).unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientBalance { .. }));
        assert_eq!(account.balance, 5);
    }

    #[tokio::test]
    async fn test_memory_store_merge_creates_account() {
        let store = MemoryAccountStore::new();
        assert!(store.get_account("9R").await.is_none());

        let account = store.merge("9R", AccountDiff::both(100)).await.unwrap();
        assert_eq!(account.balance, 100);
        assert_eq!(store.get_account("9R").await.unwrap().u_balance, 100);

        store.merge("9R", AccountDiff::unconfirmed(-40)).await.unwrap();
        let account = store.get_account("9R").await.unwrap();
        assert_eq!((account.balance, account.u_balance), (100, 60));
        assert_eq!(store.account_count().await, 1);
    }
}
