use actix_web::{HttpResponse, Responder, get, web};

use super::models::AppState;

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.network.stats())
}
