// src/lib.rs
use actix_web::http::Method;
use actix_web::{middleware, web};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod validation;
pub mod workflow;

use crate::config::Config;
use crate::errors::SolaError;
use crate::services::{
    GeminiService, GenerativeModel, ImageProcessor, RateLimitStore, RateLimiter, RatePolicy,
    RedisRateStore,
};

#[derive(Clone)]
pub struct AppState {
    pub chat_limiter: Arc<RateLimiter>,
    pub transform_limiter: Arc<RateLimiter>,
    pub model: Arc<dyn GenerativeModel>,
    pub image_processor: Arc<ImageProcessor>,
    /// Request bodies are read up to this many bytes, after the rate check.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Limiters use `shared_store` when given, otherwise one in-memory map
    /// per endpoint.
    pub fn new(
        config: &Config,
        model: Arc<dyn GenerativeModel>,
        shared_store: Option<Arc<dyn RateLimitStore>>,
    ) -> Self {
        let limiter = |namespace: &'static str, limit: u32| {
            let policy = RatePolicy {
                limit,
                window: config.rate_window,
            };
            let limiter = match &shared_store {
                Some(store) => RateLimiter::new(namespace, policy, store.clone()),
                None => RateLimiter::in_memory(namespace, policy),
            };
            Arc::new(limiter)
        };

        Self {
            chat_limiter: limiter("chat", config.chat_limit),
            transform_limiter: limiter("transform", config.transform_limit),
            model,
            image_processor: Arc::new(ImageProcessor::new()),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, SolaError> {
        let model = Arc::new(GeminiService::new(
            config.gemini_api_key.clone(),
            config.gemini_base_url.clone(),
            config.chat_model.clone(),
            config.image_model.clone(),
        ));

        let shared_store: Option<Arc<dyn RateLimitStore>> = match &config.redis_url {
            Some(url) => {
                info!("Using Redis rate limit store");
                Some(Arc::new(RedisRateStore::new(url).await?))
            }
            None => {
                info!("Using in-memory rate limit store");
                None
            }
        };

        Ok(Self::new(config, model, shared_store))
    }
}

fn cors_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Credentials", "true"))
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "POST, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(cors_headers())
            .service(
                web::resource("/chat")
                    .route(web::post().to(handlers::chat))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/transform")
                    .route(web::post().to(handlers::transform))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            ),
    )
    .route("/health", web::get().to(handlers::health_check));
}

/// Registers shared state and all routes.
pub fn app_config(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state));
        routes(cfg);
    }
}
