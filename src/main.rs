mod api;
mod blockchain;
mod config;
mod error;
mod mining;
mod network;
mod node;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use api::AppState;
use config::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let settings = Settings::from_env();
    info!(
        "⛏️ Starting mining network at http://{}:{} (difficulty={}, weighted={})",
        settings.host, settings.port, settings.difficulty, settings.weight_by_hash_rate
    );

    let state = web::Data::new(AppState::new(&settings));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await
}
