//! Built-in transaction types

pub mod multisignature;
pub mod send;

pub use multisignature::MultisignatureTransaction;
pub use send::SendTransaction;
