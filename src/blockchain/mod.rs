pub mod block;
pub mod model;

pub use block::{Block, leading_zero_count};
pub use model::{BlockSummary, Chain};

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 1;

/// Reward credited to the owner of a won round.
pub const BLOCK_REWARD: u64 = 20;

/// Fixed payload of block #0.
pub const GENESIS_PAYLOAD: &str = "Genesis Block";

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Difficulty upper bound (keep low to avoid long waits)
pub const DIFF_MAX: u32 = 6;
