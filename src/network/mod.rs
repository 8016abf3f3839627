use log::info;
use serde::Serialize;

use crate::blockchain::{BlockSummary, Chain, DIFF_MAX};
use crate::config::Settings;
use crate::error::{MiningError, Result};
use crate::mining::{MiningRound, RoundContext, RoundHandle};
use crate::node::{Node, NodeHandle, NodePool, NodeRow};

/// The simulated network: one chain, one node pool, and the rounds racing
/// over them. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Network {
    ctx: RoundContext,
    default_hash_rate: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainValidation {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub height: usize,
    pub difficulty: u32,
    pub nodes: usize,
    pub total_balance: u64,
    pub rounds_in_flight: usize,
}

impl Network {
    pub fn new(difficulty: u32, default_hash_rate: u64, weight_by_hash_rate: bool) -> Self {
        Self {
            ctx: RoundContext::new(Chain::new(difficulty), NodePool::new(), weight_by_hash_rate),
            default_hash_rate: default_hash_rate.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.difficulty,
            settings.default_hash_rate,
            settings.weight_by_hash_rate,
        )
    }

    pub fn register_node(&self, address: impl Into<String>, hash_rate: u64) -> NodeHandle {
        let node = self.ctx.pool.register(Node::new(address, hash_rate));
        info!(
            "NODE #{} joined ({}, {} H/turn)",
            node.id, node.address, node.hash_rate
        );
        node
    }

    /// Register a node with a random address; hash rate defaults to the
    /// configured one.
    pub fn register_random_node(&self, hash_rate: Option<u64>) -> NodeHandle {
        let node = Node::with_random_address(hash_rate.unwrap_or(self.default_hash_rate));
        self.register_node(node.address, node.hash_rate)
    }

    /// Start a round for the next block. Without an explicit owner the most
    /// recently registered node owns it.
    pub fn start_mining_round(
        &self,
        payload: impl Into<String>,
        owner: Option<u64>,
    ) -> Result<RoundHandle> {
        let owner = match owner {
            Some(id) => self
                .ctx
                .pool
                .get(id)
                .ok_or(MiningError::UnknownNode(id))?,
            None => self.ctx.pool.latest().ok_or(MiningError::EmptyPool)?,
        };
        Ok(MiningRound::prepare(&self.ctx, owner, payload)?.spawn())
    }

    /// Register a fresh node and start a round it owns.
    pub fn join_and_mine(
        &self,
        hash_rate: Option<u64>,
        payload: impl Into<String>,
    ) -> Result<RoundHandle> {
        let node = self.register_random_node(hash_rate);
        self.start_mining_round(payload, Some(node.id))
    }

    pub fn default_hash_rate(&self) -> u64 {
        self.default_hash_rate
    }

    pub fn current_chain_summary(&self) -> Vec<BlockSummary> {
        self.ctx.chain.lock().expect("mutex poisoned").summary()
    }

    pub fn node_table(&self) -> Vec<NodeRow> {
        self.ctx.pool.table()
    }

    pub fn difficulty(&self) -> u32 {
        self.ctx.chain.lock().expect("mutex poisoned").difficulty()
    }

    /// Change the difficulty for future rounds. Refused while any round is
    /// searching, since a round validates against the value it started with.
    pub fn set_difficulty(&self, difficulty: u32) -> Result<u32> {
        if difficulty > DIFF_MAX {
            return Err(MiningError::DifficultyTooHigh {
                requested: difficulty,
                max: DIFF_MAX,
            });
        }
        let mut chain = self.ctx.chain.lock().expect("mutex poisoned");
        if self.ctx.slots.active_rounds() > 0 {
            return Err(MiningError::RoundInProgress);
        }
        chain.set_difficulty(difficulty);
        info!("difficulty set to {difficulty}");
        Ok(difficulty)
    }

    pub fn validate_chain(&self) -> ChainValidation {
        let chain = self.ctx.chain.lock().expect("mutex poisoned");
        ChainValidation {
            valid: chain.is_valid_chain(),
            length: chain.len(),
            difficulty: chain.difficulty(),
        }
    }

    pub fn stats(&self) -> NetworkStats {
        let (height, difficulty) = {
            let chain = self.ctx.chain.lock().expect("mutex poisoned");
            (chain.len(), chain.difficulty())
        };
        NetworkStats {
            height,
            difficulty,
            nodes: self.ctx.pool.len(),
            total_balance: self.ctx.pool.total_balance(),
            rounds_in_flight: self.ctx.slots.active_rounds(),
        }
    }
}
