use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MiningError>;

/// Why a candidate block was refused by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `previous_hash` no longer matches the hash of the chain tip.
    StaleParent,
    /// The block digest does not have enough leading zero hex chars.
    DifficultyNotMet,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::StaleParent => write!(f, "stale parent hash"),
            RejectReason::DifficultyNotMet => write!(f, "difficulty not met"),
        }
    }
}

/// Errors scoped to a single chain or mining operation. None of them is
/// fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("invalid block #{index}: {reason}")]
    InvalidBlock { index: u64, reason: RejectReason },

    #[error("chain has no blocks")]
    EmptyChain,

    #[error("no node registered in the pool")]
    EmptyPool,

    #[error("unknown node id {0}")]
    UnknownNode(u64),

    #[error("a mining round is in progress")]
    RoundInProgress,

    #[error("difficulty {requested} too high (max {max})")]
    DifficultyTooHigh { requested: u32, max: u32 },
}
