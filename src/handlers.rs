// src/handlers.rs
use crate::errors::{Endpoint, SolaError};
use crate::models::{ChatResponse, RawChatRequest, RawTransformRequest, TransformResponse};
use crate::validation::{parse_body, validate_chat, validate_transform};
use crate::AppState;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::TryStreamExt;
use log::{error, info, warn};
use uuid::Uuid;

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client key for rate limiting: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then `unknown`.
pub fn client_id(req: &HttpRequest) -> String {
    header(req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(req, "x-real-ip"))
        .unwrap_or("unknown")
        .to_string()
}

/// Collects the request body, giving up as soon as it grows past `limit`.
/// Runs after the rate check so oversized requests still count and are
/// answered with a JSON error body.
async fn read_body(
    payload: &mut web::Payload,
    limit: usize,
    endpoint: Endpoint,
) -> Result<web::BytesMut, SolaError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|e| SolaError::InvalidInput(format!("Failed to read request body: {}", e)))?
    {
        if body.len() + chunk.len() > limit {
            return Err(match endpoint {
                Endpoint::Transform => SolaError::FileTooLarge,
                Endpoint::Chat => SolaError::InvalidInput("Request body too large".to_string()),
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub async fn method_not_allowed() -> Result<HttpResponse, SolaError> {
    Err(SolaError::MethodNotAllowed)
}

pub async fn chat(
    req: HttpRequest,
    mut payload: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, SolaError> {
    let endpoint = Endpoint::Chat;
    let request_id = Uuid::new_v4();
    let client = client_id(&req);

    let decision = data.chat_limiter.check(&client).await;
    if !decision.allowed {
        warn!("[{} {}] rate limit reached for {}", endpoint.name(), request_id, client);
        return Err(SolaError::RateLimited);
    }

    let body = read_body(&mut payload, data.max_body_bytes, endpoint)
        .await
        .inspect_err(|e| warn!("[{} {}] rejected body: {}", endpoint.name(), request_id, e))?;
    let raw: RawChatRequest = parse_body(&body)?;
    let prompt = validate_chat(raw)?;

    if !data.model.has_credential() {
        error!("[{} {}] GEMINI_API_KEY not configured", endpoint.name(), request_id);
        return Err(SolaError::MissingCredential);
    }

    let response = data.model.chat(&prompt.turns).await.map_err(|e| {
        error!("[{} {}] upstream error: {}", endpoint.name(), request_id, e);
        SolaError::upstream(endpoint, e)
    })?;

    info!(
        "[{} {}] answered {} turns, {} remaining",
        endpoint.name(),
        request_id,
        prompt.turns.len(),
        decision.remaining
    );

    Ok(HttpResponse::Ok().json(ChatResponse {
        success: true,
        response,
        remaining: decision.remaining,
    }))
}

pub async fn transform(
    req: HttpRequest,
    mut payload: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, SolaError> {
    let endpoint = Endpoint::Transform;
    let request_id = Uuid::new_v4();
    let client = client_id(&req);

    let decision = data.transform_limiter.check(&client).await;
    if !decision.allowed {
        warn!("[{} {}] rate limit reached for {}", endpoint.name(), request_id, client);
        return Err(SolaError::RateLimited);
    }

    let body = read_body(&mut payload, data.max_body_bytes, endpoint)
        .await
        .inspect_err(|e| warn!("[{} {}] rejected body: {}", endpoint.name(), request_id, e))?;
    let raw: RawTransformRequest = parse_body(&body)?;
    let image = validate_transform(raw, &data.image_processor)?;

    if !data.model.has_credential() {
        error!("[{} {}] GEMINI_API_KEY not configured", endpoint.name(), request_id);
        return Err(SolaError::MissingCredential);
    }

    let encoded = data.model.transform(&image).await.map_err(|e| {
        error!("[{} {}] upstream error: {}", endpoint.name(), request_id, e);
        SolaError::upstream(endpoint, e)
    })?;

    info!(
        "[{} {}] {} bytes of {} transformed, {} remaining",
        endpoint.name(),
        request_id,
        image.bytes.len(),
        image.mime_type,
        decision.remaining
    );

    Ok(HttpResponse::Ok().json(TransformResponse {
        success: true,
        result: format!("data:image/png;base64,{}", encoded),
        remaining: decision.remaining,
    }))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sola",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
