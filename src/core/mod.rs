//! Core data model
//!
//! - Transactions (type tags, assets, confirmed form)
//! - Accounts and the account store collaborator
//! - Block references used by the confirmed lifecycle
//! - Height-aware fee schedule

pub mod account;
pub mod block;
pub mod fee;
pub mod transaction;

pub use account::{Account, AccountDiff, AccountLedger, AccountStore, MemoryAccountStore};
pub use block::SignedBlock;
pub use fee::{FeeMilestone, FeeSchedule, FeeTable};
pub use transaction::{
    same_signature, strip_marker, Asset, ConfirmedTransaction, MultisignatureAsset, Transaction,
    TransactionError, TransactionType,
};
