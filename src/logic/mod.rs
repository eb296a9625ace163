//! Transaction lifecycle
//!
//! The per-type contract, the registry that dispatches to it, and the
//! processor that runs the shared checks around every call.

pub mod bytes;
pub mod lifecycle;
pub mod processor;
pub mod registry;
pub mod types;

pub use lifecycle::{threshold_ready, AssetReader, DbSaveDescriptor, RawRow, TransactionLifecycle};
pub use processor::TransactionLogic;
pub use registry::TransactionTypeRegistry;
pub use types::{MultisignatureTransaction, SendTransaction};
