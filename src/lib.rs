//! txcore: the transaction-processing core of an account-based blockchain node
//!
//! This crate provides:
//! - A per-type transaction lifecycle contract with registry dispatch
//! - Canonical transaction encoding, ids and co-signer digests (secp256k1)
//! - Historical exception overrides keyed by transaction id and sender
//! - Multisignature signature collection on a serialized balance sequence
//! - Height-aware fee schedules loaded from JSON
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use txcore::config::ProtocolConstants;
//! use txcore::core::{MemoryAccountStore, Transaction, TransactionType};
//! use txcore::crypto::KeyPair;
//! use txcore::logic::TransactionTypeRegistry;
//!
//! let constants = ProtocolConstants::default();
//! let registry =
//!     TransactionTypeRegistry::with_builtin_types(&constants, Arc::new(MemoryAccountStore::new()));
//!
//! let sender = KeyPair::generate();
//! let mut tx = Transaction::new(TransactionType::Send, &sender.public_key_hex(), 0);
//! tx.recipient_id = Some("12345R".to_string());
//! tx.amount = 100;
//! tx.fee = constants.fees.fees_at(1).send;
//! tx.signature = registry.sign(&tx, &sender).unwrap();
//! tx.id = registry.get_id(&tx).unwrap();
//! println!("Transaction {}", tx.id);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod events;
pub mod exceptions;
pub mod logic;
pub mod multisig;
pub mod pool;
pub mod sequence;

// Re-export commonly used types
pub use config::ProtocolConstants;
pub use core::{Account, ConfirmedTransaction, SignedBlock, Transaction, TransactionError, TransactionType};
pub use crypto::{KeyPair, Secp256k1SignatureVerifier, SignatureVerifier};
pub use events::{ChangeNotifier, EventBroadcaster, EventBus};
pub use exceptions::{ExceptionPoint, ExceptionRegistry};
pub use logic::{TransactionLifecycle, TransactionLogic, TransactionTypeRegistry};
pub use multisig::{MultisigCollector, MultisigError};
pub use pool::{MemoryTransactionPool, TransactionPool};
pub use sequence::Sequence;
