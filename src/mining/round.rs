use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::slot::{SlotMembership, SlotRegistry, cancelled};
use crate::blockchain::{BLOCK_REWARD, Block, Chain, leading_zero_count};
use crate::error::{MiningError, Result};
use crate::node::{Node, NodeHandle, NodePool};

/// Everything a round needs, passed explicitly instead of living in globals.
#[derive(Clone)]
pub struct RoundContext {
    pub chain: Arc<Mutex<Chain>>,
    pub pool: Arc<NodePool>,
    pub slots: Arc<SlotRegistry>,
    /// When set, a drawn node performs `hash_rate` attempts per turn.
    pub weight_by_hash_rate: bool,
}

impl RoundContext {
    pub fn new(chain: Chain, pool: NodePool, weight_by_hash_rate: bool) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            pool: Arc::new(pool),
            slots: Arc::new(SlotRegistry::new()),
            weight_by_hash_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    Searching,
    Won,
    Cancelled,
}

/// Result of a won round.
#[derive(Debug, Clone, Serialize)]
pub struct MinedBlock {
    pub round_id: String,
    pub index: u64,
    pub hash: String,
    pub previous_hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub owner_id: u64,
    pub owner_address: String,
    pub reward: u64,
    pub attempts: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub enum RoundOutcome {
    /// Block appended and reward credited to the round's owner.
    Won(MinedBlock),
    /// A sibling won the slot, or the round was aborted. No reward.
    Cancelled,
    /// The chain refused the block, e.g. another slot advanced the tip. No reward.
    Rejected(MiningError),
}

impl RoundOutcome {
    pub fn is_won(&self) -> bool {
        matches!(self, RoundOutcome::Won(_))
    }

    pub fn state(&self) -> RoundState {
        match self {
            RoundOutcome::Won(_) => RoundState::Won,
            RoundOutcome::Cancelled | RoundOutcome::Rejected(_) => RoundState::Cancelled,
        }
    }
}

/// One proof-of-work race for the next block.
pub struct MiningRound {
    id: Uuid,
    ctx: RoundContext,
    owner: NodeHandle,
    block: Block,
    difficulty: u32,
    membership: SlotMembership,
    cancel_rx: watch::Receiver<bool>,
    state: RoundState,
}

impl MiningRound {
    /// Snapshot the tip and difficulty and enter the slot for the next index.
    pub fn prepare(
        ctx: &RoundContext,
        owner: NodeHandle,
        payload: impl Into<String>,
    ) -> Result<Self> {
        if ctx.pool.is_empty() {
            return Err(MiningError::EmptyPool);
        }

        // Snapshot and slot entry happen under the chain lock so a concurrent
        // winner cannot slip between them.
        let chain = ctx.chain.lock().expect("mutex poisoned");
        let index = chain.len() as u64;
        let block = Block::new(index, payload, chain.tip_hash()?);
        let difficulty = chain.difficulty();
        let membership = ctx.slots.join(index);
        drop(chain);

        let cancel_rx = membership.slot().subscribe();
        Ok(Self {
            id: Uuid::new_v4(),
            ctx: ctx.clone(),
            owner,
            block,
            difficulty,
            membership,
            cancel_rx,
            state: RoundState::Idle,
        })
    }

    pub fn index(&self) -> u64 {
        self.block.index
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Spawn the search on the current runtime.
    pub fn spawn(self) -> RoundHandle {
        let id = self.id;
        let index = self.block.index;
        let owner = self.owner.clone();
        let join = tokio::spawn(self.run());
        RoundHandle {
            id,
            index,
            owner,
            join,
        }
    }

    /// Search for a nonce until the digest meets the difficulty or the slot
    /// is cancelled. The only suspension point is waiting for a pool turn.
    pub async fn run(mut self) -> RoundOutcome {
        self.state = RoundState::Searching;
        let started = Instant::now();
        info!(
            "ROUND {} - searching block #{} for node #{} (difficulty={})",
            self.id, self.block.index, self.owner.id, self.difficulty
        );

        let mut digest = self.block.compute_hash();
        let mut attempts: u64 = 1;

        while leading_zero_count(&digest) < self.difficulty as usize {
            let turn = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel_rx) => None,
                turn = self.ctx.pool.take_turn() => Some(turn),
            };
            let node = match turn {
                None => return self.cancel(attempts),
                Some(Ok(node)) => node,
                Some(Err(e)) => {
                    warn!("ROUND {} - {}", self.id, e);
                    return self.cancel(attempts);
                }
            };

            attempts += self.hash_turn(&node, &mut digest);
            self.ctx.pool.return_turn(node);
        }

        self.settle(digest, attempts, started.elapsed())
    }

    /// Nonce attempts for one drawn turn: `hash_rate` of them when weighting
    /// is on, otherwise one. Stops early on a winning digest and returns the
    /// number of hashes computed.
    fn hash_turn(&mut self, node: &Node, digest: &mut String) -> u64 {
        let tries = if self.ctx.weight_by_hash_rate {
            node.hash_rate
        } else {
            1
        };
        let mut done = 0;
        while done < tries {
            self.block.nonce = self.block.nonce.wrapping_add(1);
            *digest = self.block.compute_hash();
            done += 1;
            if leading_zero_count(digest) >= self.difficulty as usize {
                break;
            }
        }
        done
    }

    fn cancel(mut self, attempts: u64) -> RoundOutcome {
        self.state = RoundState::Cancelled;
        debug!(
            "ROUND {} - cancelled on block #{} after {} attempts",
            self.id, self.block.index, attempts
        );
        RoundOutcome::Cancelled
    }

    /// Append under the chain lock, then broadcast cancellation to siblings
    /// and credit the owner.
    fn settle(mut self, digest: String, attempts: u64, elapsed: Duration) -> RoundOutcome {
        let mut chain = self.ctx.chain.lock().expect("mutex poisoned");
        if self.membership.slot().is_cancelled() {
            drop(chain);
            return self.cancel(attempts);
        }
        let previous_hash = self.block.previous_hash.clone();
        let nonce = self.block.nonce;
        if let Err(e) = chain.append(self.block.clone()) {
            drop(chain);
            warn!(
                "ROUND {} - block #{} rejected: {}",
                self.id, self.block.index, e
            );
            self.state = RoundState::Cancelled;
            return RoundOutcome::Rejected(e);
        }
        self.membership.win();
        drop(chain);

        // The owner is rewarded, not whichever node held the winning turn.
        self.owner.credit(BLOCK_REWARD);
        self.state = RoundState::Won;
        info!(
            "ROUND {} - sealed block #{} (hash={}, nonce={}, attempts={}, {} ms)",
            self.id,
            self.block.index,
            digest,
            nonce,
            attempts,
            elapsed.as_millis()
        );

        RoundOutcome::Won(MinedBlock {
            round_id: self.id.to_string(),
            index: self.block.index,
            hash: digest,
            previous_hash,
            nonce,
            difficulty: self.difficulty,
            owner_id: self.owner.id,
            owner_address: self.owner.address.clone(),
            reward: BLOCK_REWARD,
            attempts,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Handle to a spawned round.
pub struct RoundHandle {
    pub id: Uuid,
    pub index: u64,
    pub owner: NodeHandle,
    join: JoinHandle<RoundOutcome>,
}

impl RoundHandle {
    /// Wait for the round to finish.
    pub async fn outcome(self) -> RoundOutcome {
        let id = self.id;
        Self::resolve(id, self.join.await)
    }

    /// Wait at most `limit`; on expiry the round is aborted without reward.
    pub async fn wait_timeout(mut self, limit: Duration) -> RoundOutcome {
        match tokio::time::timeout(limit, &mut self.join).await {
            Ok(joined) => Self::resolve(self.id, joined),
            Err(_) => {
                self.join.abort();
                let outcome = Self::resolve(self.id, self.join.await);
                if !outcome.is_won() {
                    warn!("ROUND {} - timed out after {:?}", self.id, limit);
                }
                outcome
            }
        }
    }

    fn resolve(
        id: Uuid,
        joined: std::result::Result<RoundOutcome, tokio::task::JoinError>,
    ) -> RoundOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                debug!("ROUND {id} - aborted");
                RoundOutcome::Cancelled
            }
            Err(e) => {
                error!("ROUND {id} - task failed: {e}");
                RoundOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MiningRound, RoundContext, RoundOutcome, RoundState};
    use crate::blockchain::{Chain, leading_zero_count};
    use crate::error::MiningError;
    use crate::node::{Node, NodePool};
    use std::time::Duration;

    fn context(difficulty: u32) -> RoundContext {
        RoundContext::new(Chain::new(difficulty), NodePool::new(), false)
    }

    #[tokio::test]
    async fn single_round_appends_and_rewards() {
        let ctx = context(1);
        let h0 = ctx.chain.lock().unwrap().tip_hash().unwrap();
        let a = ctx.pool.register(Node::new("10.0.0.1", 10));

        let round = MiningRound::prepare(&ctx, a.clone(), "tx1").unwrap();
        assert_eq!(round.state(), RoundState::Idle);
        assert_eq!(round.index(), 1);

        let outcome = round.run().await;
        let RoundOutcome::Won(mined) = outcome else {
            panic!("expected a win, got {outcome:?}");
        };
        assert_eq!(mined.index, 1);
        assert_eq!(mined.previous_hash, h0);
        assert!(leading_zero_count(&mined.hash) >= 1);
        assert_eq!(a.balance(), 20);

        let chain = ctx.chain.lock().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.latest().unwrap().compute_hash(), mined.hash);
        assert!(chain.is_valid_chain());
        assert_eq!(ctx.slots.active_rounds(), 0);
    }

    #[tokio::test]
    async fn zero_difficulty_wins_on_first_hash() {
        let ctx = context(0);
        let a = ctx.pool.register(Node::new("a", 1));
        let outcome = MiningRound::prepare(&ctx, a, "free").unwrap().run().await;
        let RoundOutcome::Won(mined) = outcome else {
            panic!("expected a win");
        };
        assert_eq!(mined.nonce, 0);
        assert_eq!(mined.attempts, 1);
    }

    #[tokio::test]
    async fn empty_pool_is_refused() {
        let ctx = context(1);
        let orphan = std::sync::Arc::new(Node::new("nobody", 1));
        let err = MiningRound::prepare(&ctx, orphan, "tx").err().unwrap();
        assert_eq!(err, MiningError::EmptyPool);
    }

    #[tokio::test]
    async fn sibling_rounds_produce_one_winner() {
        let ctx = context(1);
        let a = ctx.pool.register(Node::new("a", 10));
        let b = ctx.pool.register(Node::new("b", 10));

        let first = MiningRound::prepare(&ctx, a.clone(), "from a").unwrap().spawn();
        let second = MiningRound::prepare(&ctx, b.clone(), "from b").unwrap().spawn();
        assert_eq!(first.index, second.index);

        let outcomes = [first.outcome().await, second.outcome().await];
        let winners = outcomes.iter().filter(|o| o.is_won()).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| matches!(o, RoundOutcome::Cancelled))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(cancelled, 1);

        assert_eq!(ctx.chain.lock().unwrap().len(), 2);
        assert_eq!(a.balance() + b.balance(), 20);
        assert_eq!(ctx.slots.active_rounds(), 0);
    }

    #[tokio::test]
    async fn reward_goes_to_owner_not_turn_holder() {
        let ctx = context(2);
        let owner = ctx.pool.register(Node::new("owner", 1));
        let bystander = ctx.pool.register(Node::new("bystander", 1));

        let outcome = MiningRound::prepare(&ctx, owner.clone(), "tx").unwrap().run().await;
        assert!(outcome.is_won());
        assert_eq!(owner.balance(), 20);
        assert_eq!(bystander.balance(), 0);
    }

    #[tokio::test]
    async fn rounds_in_sequence_accumulate_rewards() {
        let ctx = context(1);
        let nodes: Vec<_> = (0..4)
            .map(|i| ctx.pool.register(Node::new(format!("10.0.0.{i}"), 5)))
            .collect();

        for (i, node) in nodes.iter().enumerate() {
            let outcome = MiningRound::prepare(&ctx, node.clone(), format!("tx{i}"))
                .unwrap()
                .run()
                .await;
            assert!(outcome.is_won());
        }

        assert_eq!(ctx.chain.lock().unwrap().len(), 5);
        assert_eq!(ctx.pool.total_balance(), 20 * 4);
    }

    #[tokio::test]
    async fn stale_parent_is_rejected_without_reward() {
        let ctx = context(0);
        let a = ctx.pool.register(Node::new("a", 1));
        let late = MiningRound::prepare(&ctx, a.clone(), "late").unwrap();

        // Advance the tip outside of the late round's slot.
        {
            let mut chain = ctx.chain.lock().unwrap();
            let block = crate::blockchain::Block::new(1, "other", chain.tip_hash().unwrap());
            chain.append(block).unwrap();
        }
        ctx.slots.close(1);

        let outcome = late.run().await;
        assert!(matches!(
            outcome,
            RoundOutcome::Rejected(MiningError::InvalidBlock { .. })
        ));
        assert_eq!(outcome.state(), RoundState::Cancelled);
        assert_eq!(a.balance(), 0);
        assert_eq!(ctx.chain.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timeout_cancels_without_reward() {
        // Unreachable difficulty: the round can only end by timeout.
        let ctx = context(64);
        let a = ctx.pool.register(Node::new("a", 1));
        let handle = MiningRound::prepare(&ctx, a.clone(), "never").unwrap().spawn();

        let outcome = handle.wait_timeout(Duration::from_millis(50)).await;
        assert!(matches!(outcome, RoundOutcome::Cancelled));
        assert_eq!(a.balance(), 0);
        assert_eq!(ctx.chain.lock().unwrap().len(), 1);
        assert_eq!(ctx.slots.active_rounds(), 0);
        assert_eq!(ctx.pool.len(), 1);
    }

    #[tokio::test]
    async fn weighted_turns_still_terminate() {
        let ctx = RoundContext::new(Chain::new(2), NodePool::new(), true);
        let a = ctx.pool.register(Node::new("fast", 50));
        let outcome = MiningRound::prepare(&ctx, a.clone(), "tx").unwrap().run().await;
        assert!(outcome.is_won());
        assert_eq!(a.balance(), 20);
    }

    #[tokio::test]
    async fn weighted_turn_hashes_once_per_unit_of_rate() {
        // Unreachable difficulty, so no turn stops early.
        let ctx = RoundContext::new(Chain::new(64), NodePool::new(), true);
        let fast = ctx.pool.register(Node::new("fast", 50));
        let mut round = MiningRound::prepare(&ctx, fast.clone(), "tx").unwrap();
        let mut digest = String::new();

        assert_eq!(round.hash_turn(&fast, &mut digest), 50);
        assert_eq!(round.block.nonce, 50);
        assert_eq!(digest, round.block.compute_hash());

        let slow = ctx.pool.register(Node::new("slow", 3));
        assert_eq!(round.hash_turn(&slow, &mut digest), 3);
        assert_eq!(round.block.nonce, 53);
    }

    #[tokio::test]
    async fn unweighted_turn_hashes_once() {
        let ctx = context(64);
        let fast = ctx.pool.register(Node::new("fast", 50));
        let mut round = MiningRound::prepare(&ctx, fast.clone(), "tx").unwrap();
        let mut digest = String::new();

        assert_eq!(round.hash_turn(&fast, &mut digest), 1);
        assert_eq!(round.block.nonce, 1);
    }

    #[tokio::test]
    async fn weighted_turn_stops_on_winning_digest() {
        let ctx = RoundContext::new(Chain::new(0), NodePool::new(), true);
        let fast = ctx.pool.register(Node::new("fast", 50));
        let mut round = MiningRound::prepare(&ctx, fast.clone(), "tx").unwrap();
        let mut digest = String::new();

        assert_eq!(round.hash_turn(&fast, &mut digest), 1);
    }
}
