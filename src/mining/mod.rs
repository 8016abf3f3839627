pub mod round;
pub mod slot;

pub use round::{MinedBlock, MiningRound, RoundContext, RoundHandle, RoundOutcome, RoundState};
