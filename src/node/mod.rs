pub mod model;
pub mod pool;

pub use model::{Node, NodeHandle, NodeRow};
pub use pool::NodePool;

/// Hash rate given to nodes registered without one.
pub const DEFAULT_HASH_RATE: u64 = 10;
