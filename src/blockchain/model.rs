use serde::Serialize;

use super::{Block, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH};
use crate::error::{MiningError, RejectReason, Result};

/// Read-only view of one block, for display.
#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub previous_hash: String,
    pub hash: String,
    pub timestamp: i64,
    /// Target the block was accepted under.
    pub difficulty: u32,
}

/// Simple in-memory blockchain with Proof-of-Work.
#[derive(Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    /// Difficulty each block was appended under, parallel to `blocks`.
    targets: Vec<u32>,
    difficulty: u32,
}

impl Chain {
    /// Initialize a new chain with a genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            targets: vec![0],
            difficulty,
        }
    }

    /// Return the last block in the chain.
    pub fn latest(&self) -> Result<&Block> {
        self.blocks.last().ok_or(MiningError::EmptyChain)
    }

    /// Hash of the tip, i.e. the parent hash for the next candidate.
    pub fn tip_hash(&self) -> Result<String> {
        Ok(self.latest()?.compute_hash())
    }

    /// Append a mined block. The candidate must point at the current tip and
    /// satisfy the current difficulty; otherwise the chain is left untouched.
    pub fn append(&mut self, candidate: Block) -> Result<()> {
        let tip_hash = self.tip_hash()?;
        if candidate.previous_hash != tip_hash {
            return Err(MiningError::InvalidBlock {
                index: candidate.index,
                reason: RejectReason::StaleParent,
            });
        }
        if !candidate.meets_difficulty(self.difficulty) {
            return Err(MiningError::InvalidBlock {
                index: candidate.index,
                reason: RejectReason::DifficultyNotMet,
            });
        }
        self.blocks.push(candidate);
        self.targets.push(self.difficulty);
        Ok(())
    }

    /// Validate the entire chain: genesis, linkage and PoW. Each block is
    /// checked against the difficulty it was appended under.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.blocks.first() else {
            return false;
        };
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || genesis.payload != GENESIS_PAYLOAD
        {
            return false;
        }

        if self.targets.len() != self.blocks.len() {
            return false;
        }

        self.blocks
            .windows(2)
            .zip(&self.targets[1..])
            .all(|(pair, &target)| {
                let (prev, current) = (&pair[0], &pair[1]);
                current.index == prev.index + 1
                    && current.previous_hash == prev.compute_hash()
                    && current.meets_difficulty(target)
            })
    }

    pub fn summary(&self) -> Vec<BlockSummary> {
        self.blocks
            .iter()
            .zip(&self.targets)
            .map(|(b, &difficulty)| BlockSummary {
                index: b.index,
                previous_hash: b.previous_hash.clone(),
                hash: b.compute_hash(),
                timestamp: b.timestamp,
                difficulty,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: u32) {
        // NOTE: Changing difficulty affects future blocks only.
        self.difficulty = difficulty;
    }
}
