//! Block reference passed to the confirmed lifecycle calls
//!
//! Block assembly and validation live outside this crate; the lifecycle only
//! needs the identity and position of the block a transaction lands in.

use serde::{Deserialize, Serialize};

/// A signed block as seen by `apply` / `undo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBlock {
    /// Block identifier
    pub id: String,
    /// Height in the chain
    pub height: u64,
    /// Seconds since the network epoch
    pub timestamp: i32,
    /// Forger of the block
    pub generator_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_block: Option<String>,
}

impl SignedBlock {
    pub fn new(id: &str, height: u64, timestamp: i32, generator_public_key: &str) -> Self {
        Self {
            id: id.to_string(),
            height,
            timestamp,
            generator_public_key: generator_public_key.to_string(),
            previous_block: None,
        }
    }

    /// Chain this block onto a parent
    pub fn with_previous(mut self, previous_block: &str) -> Self {
        self.previous_block = Some(previous_block.to_string());
        self
    }
}
