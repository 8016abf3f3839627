use chrono::Utc;
use sha2::{Digest, Sha256};

use super::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH};

/// A single block in the chain. Only `nonce` changes after creation, and only
/// while the block is being mined.
#[derive(Debug, Clone)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp in milliseconds (UTC)
    pub payload: String,
    pub previous_hash: String,
    pub nonce: u64, // Proof-of-Work nonce
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        Self::new(0, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH)
    }

    /// Create a new block (not mined yet). The nonce starts at 0.
    pub fn new(index: u64, payload: impl Into<String>, previous_hash: impl Into<String>) -> Self {
        Self {
            index,
            timestamp: Utc::now().timestamp_millis(),
            payload: payload.into(),
            previous_hash: previous_hash.into(),
            nonce: 0,
        }
    }

    /// Hex SHA-256 of the block's canonical JSON form. `serde_json::Map` keeps
    /// keys sorted, so the preimage does not depend on field declaration order.
    pub fn compute_hash(&self) -> String {
        let preimage = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "payload": self.payload,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });
        let mut hasher = Sha256::new();
        hasher.update(preimage.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the current digest starts with `difficulty` zero hex chars.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        leading_zero_count(&self.compute_hash()) >= difficulty as usize
    }
}

/// Number of leading `'0'` characters of a hex digest.
pub fn leading_zero_count(digest: &str) -> usize {
    digest.chars().take_while(|c| *c == '0').count()
}
