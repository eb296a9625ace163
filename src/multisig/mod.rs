//! Multi-signature signature collection
//!
//! Transactions from multisig accounts, and group registrations themselves,
//! wait in the pool until enough co-signers have signed them.
//!
//! # Example
//!
//! ```ignore
//! use txcore::multisig::MultisigCollector;
//!
//! let collector = MultisigCollector::new(pool, accounts, verifier, registry, bus, notifier, balances);
//! collector.add_pending(tx.clone()).await;
//!
//! // Each co-signer submits their signature
//! collector.process_signature(&signature1, &tx.id).await?;
//! let receipt = collector.process_signature(&signature2, &tx.id).await?;
//!
//! // Transaction is now ready for block inclusion
//! assert!(receipt.ready);
//! ```

pub mod collector;
pub mod queue;

pub use collector::{DenialReason, ErrorKind, MultisigCollector, MultisigError, SignatureReceipt};
pub use queue::{PendingMultisigPayload, PendingSignatureQueue, PendingStatus};
