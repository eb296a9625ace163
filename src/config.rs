//! Protocol constants
//!
//! Numeric tables consumed by the lifecycle: the fee schedule, multisignature
//! constraints and supply limits. Defaults are the mainnet values; a JSON
//! file can override them.

use crate::core::fee::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Inclusive bounds for a numeric asset field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub minimum: u32,
    pub maximum: u32,
}

impl Bounds {
    pub fn range(&self) -> RangeInclusive<u32> {
        self.minimum..=self.maximum
    }
}

/// Item-count bounds for a list field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBounds {
    pub min_items: usize,
    pub max_items: usize,
}

/// Limits on multisignature group registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigConstraints {
    pub min: Bounds,
    pub lifetime: Bounds,
    pub keysgroup: ItemBounds,
}

impl Default for MultisigConstraints {
    fn default() -> Self {
        Self {
            min: Bounds {
                minimum: 1,
                maximum: 15,
            },
            lifetime: Bounds {
                minimum: 1,
                maximum: 72,
            },
            keysgroup: ItemBounds {
                min_items: 1,
                max_items: 15,
            },
        }
    }
}

/// Constants shared by every node on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConstants {
    pub fees: FeeSchedule,
    pub multisig_constraints: MultisigConstraints,
    /// Upper bound for any amount
    pub total_amount: u64,
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            multisig_constraints: MultisigConstraints::default(),
            total_amount: 9_999_999_983_700_000,
        }
    }
}

impl ProtocolConstants {
    /// Load constants from a JSON file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No constants file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let constants: Self = serde_json::from_str(&raw)?;
        constants.validate()?;
        log::info!("Loaded protocol constants from {}", path.display());
        Ok(constants)
    }

    /// Save constants as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject tables no node could run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fees.milestones().is_empty() {
            return Err(ConfigError::Invalid("fee schedule is empty".to_string()));
        }

        let c = &self.multisig_constraints;
        if c.min.minimum == 0 || c.min.minimum > c.min.maximum {
            return Err(ConfigError::Invalid("multisig min bounds".to_string()));
        }
        if c.lifetime.minimum > c.lifetime.maximum {
            return Err(ConfigError::Invalid("multisig lifetime bounds".to_string()));
        }
        if c.keysgroup.min_items == 0 || c.keysgroup.min_items > c.keysgroup.max_items {
            return Err(ConfigError::Invalid("multisig keysgroup bounds".to_string()));
        }

        Ok(())
    }
}
