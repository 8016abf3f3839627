mod chain;
mod health;
mod mining;
pub mod models;
mod nodes;
mod stats;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};

use crate::error::MiningError;

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::get_difficulty)
            .service(chain::set_difficulty)
            .service(nodes::register_node)
            .service(nodes::join_and_mine)
            .service(nodes::node_table)
            .service(mining::mine_block)
            .service(stats::get_stats),
    );
}

fn error_response(err: &MiningError) -> HttpResponse {
    let body = err.to_string();
    match err {
        MiningError::UnknownNode(_) => HttpResponse::NotFound().body(body),
        MiningError::RoundInProgress => HttpResponse::Conflict().body(body),
        _ => HttpResponse::BadRequest().body(body),
    }
}
