//! Height-aware fee schedule
//!
//! Fees change at protocol milestones. Each milestone carries a full fee
//! table that applies from its height until the next milestone.

use crate::core::transaction::TransactionType;
use serde::{Deserialize, Serialize};

// =============================================================================
// Fee Table
// =============================================================================

/// Base fee per transaction type, in the smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTable {
    pub send: u64,
    pub vote: u64,
    pub secondsignature: u64,
    pub delegate: u64,
    pub multisignature: u64,
    pub dapp: u64,
}

impl FeeTable {
    /// Base fee for a transaction type
    ///
    /// Dapp transfers are charged like a plain send.
    pub fn base_fee(&self, tx_type: TransactionType) -> u64 {
        match tx_type {
            TransactionType::Send
            | TransactionType::InTransfer
            | TransactionType::OutTransfer => self.send,
            TransactionType::Signature => self.secondsignature,
            TransactionType::Delegate => self.delegate,
            TransactionType::Vote => self.vote,
            TransactionType::Multi => self.multisignature,
            TransactionType::Dapp => self.dapp,
        }
    }
}

impl Default for FeeTable {
    fn default() -> Self {
        Self {
            send: 10_000_000,
            vote: 100_000_000,
            secondsignature: 10_000_000,
            delegate: 500_000_000,
            multisignature: 100_000_000,
            dapp: 2_500_000_000,
        }
    }
}

/// A fee table and the height it takes effect at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMilestone {
    pub height: u64,
    pub fees: FeeTable,
}

// =============================================================================
// Fee Schedule
// =============================================================================

/// Ordered list of fee milestones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FeeMilestone>", into = "Vec<FeeMilestone>")]
pub struct FeeSchedule {
    milestones: Vec<FeeMilestone>,
}

impl FeeSchedule {
    /// Build a schedule, ordering milestones by height
    pub fn new(mut milestones: Vec<FeeMilestone>) -> Self {
        milestones.sort_by_key(|m| m.height);
        Self { milestones }
    }

    pub fn milestones(&self) -> &[FeeMilestone] {
        &self.milestones
    }

    /// Fee table in force at `height`
    ///
    /// Heights before the first milestone use the first table.
    pub fn fees_at(&self, height: u64) -> FeeTable {
        self.milestones
            .iter()
            .rev()
            .find(|m| m.height <= height)
            .or_else(|| self.milestones.first())
            .map(|m| m.fees)
            .unwrap_or_default()
    }
}

impl From<Vec<FeeMilestone>> for FeeSchedule {
    fn from(milestones: Vec<FeeMilestone>) -> Self {
        Self::new(milestones)
    }
}

impl From<FeeSchedule> for Vec<FeeMilestone> {
    fn from(schedule: FeeSchedule) -> Self {
        schedule.milestones
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(vec![FeeMilestone {
            height: 1,
            fees: FeeTable::default(),
        }])
    }
}

// =============================================================================
// Tests
// =============================================================================
