//! Transaction data model
//!
//! The account-based transaction record shared by every transaction type,
//! its confirmed form, and the type-specific asset payloads.

use crate::core::block::SignedBlock;
use crate::crypto::{address_from_public_key_hex, KeyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Lifecycle errors raised while verifying, applying or undoing a transaction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Unknown transaction type {0}")]
    UnknownTransactionType(u8),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid transaction asset: {0}")]
    InvalidAsset(String),
    #[error("Invalid transaction fee: expected {expected}, got {actual}")]
    InvalidFee { expected: u64, actual: u64 },
    #[error("Account {address} does not have enough balance: {available} < {required}")]
    InsufficientBalance {
        address: String,
        required: u64,
        available: u64,
    },
    #[error("Transaction {0} is not ready")]
    NotReady(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<KeyError> for TransactionError {
    fn from(err: KeyError) -> Self {
        TransactionError::Crypto(err.to_string())
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Type tag identifying which lifecycle handler processes a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TransactionType {
    Send = 0,
    Signature = 1,
    Delegate = 2,
    Vote = 3,
    /// Registers a multisignature group on the sender account
    Multi = 4,
    Dapp = 5,
    InTransfer = 6,
    OutTransfer = 7,
}

impl TransactionType {
    pub const ALL: [TransactionType; 8] = [
        TransactionType::Send,
        TransactionType::Signature,
        TransactionType::Delegate,
        TransactionType::Vote,
        TransactionType::Multi,
        TransactionType::Dapp,
        TransactionType::InTransfer,
        TransactionType::OutTransfer,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TransactionType::Send => "send",
            TransactionType::Signature => "secondsignature",
            TransactionType::Delegate => "delegate",
            TransactionType::Vote => "vote",
            TransactionType::Multi => "multisignature",
            TransactionType::Dapp => "dapp",
            TransactionType::InTransfer => "intransfer",
            TransactionType::OutTransfer => "outtransfer",
        }
    }

    /// Parse either a numeric tag or a type name
    pub fn parse(value: &str) -> Option<Self> {
        if let Ok(tag) = value.parse::<u8>() {
            return Self::try_from(tag).ok();
        }
        Self::ALL.into_iter().find(|t| t.name() == value)
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = TransactionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_u8() == value)
            .ok_or(TransactionError::UnknownTransactionType(value))
    }
}

impl From<TransactionType> for u8 {
    fn from(value: TransactionType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Assets
// =============================================================================

/// Multisignature group registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisignatureAsset {
    /// Signatures required once the group is active
    pub min: u32,
    /// Hours a pending transaction may wait for co-signers
    pub lifetime: u32,
    /// Co-signer keys, each prefixed with `+` (add) or `-` (remove)
    pub keysgroup: Vec<String>,
    /// Present once the registration has been finalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,
}

impl MultisignatureAsset {
    /// Keysgroup entries with their operation marker stripped
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keysgroup.iter().map(|entry| strip_marker(entry))
    }
}

/// Drop the leading operation marker of a keysgroup entry
pub fn strip_marker(entry: &str) -> &str {
    entry.char_indices().nth(1).map_or("", |(i, _)| &entry[i..])
}

/// Whether two signature encodings carry the same bytes; hex case is ignored
pub fn same_signature(a: &str, b: &str) -> bool {
    match (hex::decode(a), hex::decode(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => a == b,
    }
}

/// Type-specific payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisignature: Option<MultisignatureAsset>,
}

impl Asset {
    pub fn is_empty(&self) -> bool {
        self.multisignature.is_none()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction as submitted, before block inclusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Content-derived identifier
    #[serde(default)]
    pub id: String,
    pub amount: u64,
    pub fee: u64,
    /// Seconds since the network epoch
    pub timestamp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub sender_public_key: String,
    /// Set when a second key acts on behalf of a multisig account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_signature: Option<String>,
    /// Co-signer approvals in submission order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,
    #[serde(default)]
    pub asset: Asset,
}

impl Transaction {
    /// Create an unsigned transaction with an empty asset
    pub fn new(tx_type: TransactionType, sender_public_key: &str, timestamp: i32) -> Self {
        Self {
            tx_type,
            id: String::new(),
            amount: 0,
            fee: 0,
            timestamp,
            sender_id: None,
            sender_public_key: sender_public_key.to_string(),
            requester_public_key: None,
            recipient_id: None,
            signature: String::new(),
            sign_signature: None,
            signatures: None,
            asset: Asset::default(),
        }
    }

    /// Sender address, derived from the public key when not carried
    pub fn sender_address(&self) -> Result<String, TransactionError> {
        match &self.sender_id {
            Some(address) => Ok(address.clone()),
            None => Ok(address_from_public_key_hex(&self.sender_public_key)?),
        }
    }

    /// Whether this transaction registers a multisignature group
    pub fn is_multisig_registration(&self) -> bool {
        self.tx_type == TransactionType::Multi
    }

    /// Whether `signature` is already among the co-signer approvals
    pub fn has_signature(&self, signature: &str) -> bool {
        self.signatures
            .as_ref()
            .map_or(false, |sigs| sigs.iter().any(|s| same_signature(s, signature)))
    }

    /// Number of collected co-signer approvals
    pub fn signature_count(&self) -> usize {
        self.signatures.as_ref().map_or(0, Vec::len)
    }

    /// Append a co-signer approval, creating the list when unset
    pub fn push_signature(&mut self, signature: String) {
        self.signatures.get_or_insert_with(Vec::new).push(signature);
    }

    /// Amount plus fee, the debit applied to the sender
    pub fn total_debit(&self) -> Result<u64, TransactionError> {
        self.amount.checked_add(self.fee).ok_or_else(|| {
            TransactionError::InvalidTransaction("amount plus fee overflows".to_string())
        })
    }
}

// =============================================================================
// Confirmed Transaction
// =============================================================================

/// A transaction included in a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedTransaction {
    pub transaction: Transaction,
    pub block_id: String,
    pub height: u64,
    pub sender_id: String,
}

impl ConfirmedTransaction {
    /// Bind a transaction to the block that includes it
    pub fn new(mut transaction: Transaction, block: &SignedBlock) -> Result<Self, TransactionError> {
        let sender_id = transaction.sender_address()?;
        transaction.sender_id = Some(sender_id.clone());
        Ok(Self {
            transaction,
            block_id: block.id.clone(),
            height: block.height,
            sender_id,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
