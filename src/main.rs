// src/main.rs
use actix_web::{App, HttpServer, middleware};
use log::{info, warn};

use sola::config::Config;
use sola::{AppState, app_config};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Sola service...");

    let config = Config::from_env()?;
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; API endpoints will answer SERVER_ERROR");
    }

    let app_state = AppState::from_config(&config).await?;

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(app_config(app_state.clone()))
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
