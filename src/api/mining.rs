use actix_web::{HttpResponse, Responder, post, web};
use log::{debug, info};

use super::error_response;
use super::models::{AppState, MineRequest, MineResponse};
use crate::mining::{RoundHandle, RoundOutcome};

/// Start a round for the next block and wait for it to finish.
/// Won rounds answer 200; cancelled or rejected rounds answer 409.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let req = req.into_inner();
    match state.network.start_mining_round(req.payload, req.node_id) {
        Ok(handle) => finish_round(&state, handle).await,
        Err(e) => error_response(&e),
    }
}

/// Await a round under the configured timeout and render its outcome.
pub(super) async fn finish_round(state: &AppState, handle: RoundHandle) -> HttpResponse {
    let round_id = handle.id.to_string();
    debug!(
        "MINER - round {} racing for block #{} (owner #{})",
        round_id, handle.index, handle.owner.id
    );

    let outcome = match state.round_timeout {
        Some(limit) => handle.wait_timeout(limit).await,
        None => handle.outcome().await,
    };

    if let RoundOutcome::Won(block) = &outcome {
        info!(
            "MINER - node #{} sealed block #{} (hash={}, nonce={})",
            block.owner_id, block.index, block.hash, block.nonce
        );
    }

    let won = outcome.is_won();
    let body = MineResponse::from_outcome(round_id, outcome);
    if won {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::Conflict().json(body)
    }
}
