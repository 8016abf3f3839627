use actix_web::{HttpResponse, Responder, get, post, web};

use super::error_response;
use super::mining::finish_round;
use super::models::{AppState, JoinRequest, NodeTableResponse, RegisterNodeRequest};

/// Register a mining node.
#[post("/nodes/")]
pub async fn register_node(
    state: web::Data<AppState>,
    body: Option<web::Json<RegisterNodeRequest>>,
) -> impl Responder {
    let req = body.map(|b| b.into_inner()).unwrap_or_default();
    let node = match req.address {
        Some(address) if !address.trim().is_empty() => {
            let hash_rate = req
                .hash_rate
                .unwrap_or_else(|| state.network.default_hash_rate());
            state.network.register_node(address.trim(), hash_rate)
        }
        _ => state.network.register_random_node(req.hash_rate),
    };
    HttpResponse::Ok().json(node.row())
}

/// Node table: address, hash rate and balance of every node.
#[get("/nodes/")]
pub async fn node_table(state: web::Data<AppState>) -> impl Responder {
    let nodes = state.network.node_table();
    HttpResponse::Ok().json(NodeTableResponse {
        count: nodes.len(),
        nodes,
    })
}

/// Register a fresh node and let it race for the next block.
#[post("/nodes/join/")]
pub async fn join_and_mine(
    state: web::Data<AppState>,
    body: web::Json<JoinRequest>,
) -> impl Responder {
    let req = body.into_inner();
    match state.network.join_and_mine(req.hash_rate, req.payload) {
        Ok(handle) => finish_round(&state, handle).await,
        Err(e) => error_response(&e),
    }
}
