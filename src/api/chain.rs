use actix_web::{HttpResponse, Responder, get, post, web};

use super::error_response;
use super::models::{AppState, ChainResponse, DifficultyResponse, SetDifficultyRequest};

/// Get the chain summary (index, parent hash, hash, timestamp per block).
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.network.current_chain_summary();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: state.network.difficulty(),
        chain,
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.network.validate_chain())
}

/// Get current PoW difficulty.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: state.network.difficulty(),
    })
}

/// Update PoW difficulty (affects future rounds only).
#[post("/difficulty/")]
pub async fn set_difficulty(
    state: web::Data<AppState>,
    body: web::Json<SetDifficultyRequest>,
) -> impl Responder {
    match state.network.set_difficulty(body.difficulty) {
        Ok(difficulty) => HttpResponse::Ok().json(DifficultyResponse { difficulty }),
        Err(e) => error_response(&e),
    }
}
