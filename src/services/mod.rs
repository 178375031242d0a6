// src/services/mod.rs
pub mod gemini_service;
pub mod image_processor;
pub mod rate_limiter;
pub mod redis_service;

pub use gemini_service::{GeminiService, GenerativeModel};
pub use image_processor::ImageProcessor;
pub use rate_limiter::{InMemoryRateStore, RateLimitStore, RateLimiter, RatePolicy};
pub use redis_service::RedisRateStore;
