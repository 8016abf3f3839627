use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::blockchain::BlockSummary;
use crate::config::Settings;
use crate::mining::{MinedBlock, RoundOutcome, RoundState};
use crate::network::Network;
use crate::node::NodeRow;

/// Shared application state: the simulated network plus HTTP-side limits.
pub struct AppState {
    pub network: Network,
    pub round_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            network: Network::from_settings(settings),
            round_timeout: settings.round_timeout,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

/* ---------- Node API Models ---------- */

#[derive(Deserialize, Default)]
pub struct RegisterNodeRequest {
    /// Random IPv4-looking address when omitted.
    pub address: Option<String>,
    pub hash_rate: Option<u64>,
}

#[derive(Serialize)]
pub struct NodeTableResponse {
    pub count: usize,
    pub nodes: Vec<NodeRow>,
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub hash_rate: Option<u64>,
    #[serde(default = "default_payload")]
    pub payload: String,
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct MineRequest {
    #[serde(default = "default_payload")]
    pub payload: String,
    /// Owner of the round; the latest registered node when omitted.
    pub node_id: Option<u64>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub round_id: String,
    pub state: RoundState,
    pub block: Option<MinedBlock>,
    pub reason: Option<String>,
}

impl MineResponse {
    pub fn from_outcome(round_id: String, outcome: RoundOutcome) -> Self {
        let state = outcome.state();
        match outcome {
            RoundOutcome::Won(block) => Self {
                round_id,
                state,
                block: Some(block),
                reason: None,
            },
            RoundOutcome::Cancelled => Self {
                round_id,
                state,
                block: None,
                reason: Some("cancelled".to_string()),
            },
            RoundOutcome::Rejected(e) => Self {
                round_id,
                state,
                block: None,
                reason: Some(e.to_string()),
            },
        }
    }
}

fn default_payload() -> String {
    "data".to_string()
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub chain: Vec<BlockSummary>,
}

#[derive(Serialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct SetDifficultyRequest {
    pub difficulty: u32,
}
