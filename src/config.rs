// src/config.rs
use crate::services::gemini_service::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL};
use anyhow::{Context, bail};
use std::time::Duration;

/// Runtime settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub redis_url: Option<String>,
    pub chat_limit: u32,
    pub transform_limit: u32,
    pub rate_window: Duration,
    /// Raw request body ceiling. Kept above the image limit so that most
    /// oversize uploads get the size estimate message; anything past it is
    /// also `FILE_TOO_LARGE` on transform.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            gemini_api_key: None,
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            redis_url: None,
            chat_limit: 50,
            transform_limit: 10,
            rate_window: Duration::from_secs(3600),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let positive = |key: &str, default: u64| -> anyhow::Result<u64> {
            match get(key) {
                None => Ok(default),
                Some(raw) => {
                    let value: u64 = raw
                        .trim()
                        .parse()
                        .with_context(|| format!("{} must be a positive integer, got {:?}", key, raw))?;
                    if value == 0 {
                        bail!("{} must be greater than zero", key);
                    }
                    Ok(value)
                }
            }
        };

        let chat_limit = u32::try_from(positive("SOLA_CHAT_LIMIT", defaults.chat_limit.into())?)
            .context("SOLA_CHAT_LIMIT is out of range")?;
        let transform_limit =
            u32::try_from(positive("SOLA_TRANSFORM_LIMIT", defaults.transform_limit.into())?)
                .context("SOLA_TRANSFORM_LIMIT is out of range")?;
        let window_secs = positive("SOLA_RATE_WINDOW_SECS", defaults.rate_window.as_secs())?;

        Ok(Self {
            bind_addr: get("SOLA_BIND_ADDR").unwrap_or(defaults.bind_addr),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            chat_model: get("SOLA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            image_model: get("SOLA_IMAGE_MODEL").unwrap_or(defaults.image_model),
            redis_url: get("REDIS_URL"),
            chat_limit,
            transform_limit,
            rate_window: Duration::from_secs(window_secs),
            max_body_bytes: defaults.max_body_bytes,
        })
    }
}
