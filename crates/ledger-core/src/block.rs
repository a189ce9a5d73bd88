use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};

/// A transfer waiting in the pool or recorded in a block.
///
/// Neither identifiers nor the amount are validated; a negative amount is
/// accepted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Unix seconds at creation.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        Self {
            index,
            timestamp: unix_now(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Hex SHA-256 of the block's canonical form.
    pub fn digest(&self) -> String {
        crate::hash::digest(self)
    }
}

/// The fixed first block: seed proof, sentinel previous hash, no transactions.
pub fn genesis_block() -> Block {
    Block::new(
        GENESIS_INDEX,
        vec![],
        GENESIS_PROOF,
        GENESIS_PREVIOUS_HASH.to_string(),
    )
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
