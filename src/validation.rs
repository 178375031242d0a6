// src/validation.rs
use crate::errors::SolaError;
use crate::models::{ChatPrompt, ChatTurn, ImagePayload, RawChatRequest, RawTransformRequest, Role};
use crate::services::ImageProcessor;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde_json::Value;

pub const MAX_TEXT_CHARS: usize = 2000;
pub const MAX_HISTORY_TURNS: usize = 50;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Standard alphabet, padding optional. Clients send both forms.
const IMAGE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Trims and cuts to `max_chars` characters.
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

pub fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> Result<T, SolaError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| SolaError::InvalidInput("Invalid JSON body".to_string()))
}

pub fn validate_chat(raw: RawChatRequest) -> Result<ChatPrompt, SolaError> {
    let message = match raw.message {
        Some(Value::String(m)) if !m.is_empty() => m,
        _ => return Err(SolaError::InvalidInput("Missing or invalid message".to_string())),
    };

    let history = match raw.history {
        Some(Value::Array(h)) => h,
        _ => return Err(SolaError::InvalidInput("Invalid history format".to_string())),
    };

    if history.len() > MAX_HISTORY_TURNS {
        return Err(SolaError::InvalidInput(
            "History too long. Maximum 50 messages.".to_string(),
        ));
    }

    let message = sanitize_text(&message, MAX_TEXT_CHARS);
    if message.is_empty() {
        return Err(SolaError::InvalidInput("Message cannot be empty".to_string()));
    }

    let mut turns = history
        .iter()
        .map(|entry| {
            let text = entry
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SolaError::InvalidInput("Invalid history entry".to_string()))?;
            Ok(ChatTurn {
                role: Role::coerce(entry.get("role").and_then(Value::as_str)),
                text: sanitize_text(text, MAX_TEXT_CHARS),
            })
        })
        .collect::<Result<Vec<_>, SolaError>>()?;

    turns.push(ChatTurn {
        role: Role::User,
        text: message,
    });

    Ok(ChatPrompt { turns })
}

/// Estimated decoded size of a base64 string.
pub fn estimated_size(base64_len: usize) -> usize {
    base64_len * 3 / 4
}

pub fn validate_transform(
    raw: RawTransformRequest,
    processor: &ImageProcessor,
) -> Result<ImagePayload, SolaError> {
    let base64_image = match raw.base64_image {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => return Err(SolaError::InvalidInput("Missing or invalid base64Image".to_string())),
    };

    let mime_type = match raw.mime_type {
        Some(Value::String(s)) if !s.is_empty() => s.to_lowercase(),
        _ => return Err(SolaError::InvalidInput("Missing or invalid mimeType".to_string())),
    };

    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(SolaError::InvalidFileType);
    }

    if estimated_size(base64_image.len()) > MAX_IMAGE_BYTES {
        return Err(SolaError::FileTooLarge);
    }

    // Line-wrapped payloads are common from clipboard and CLI encoders.
    let encoded: String = strip_data_url(&base64_image)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = IMAGE_BASE64
        .decode(&encoded)
        .map_err(|_| SolaError::InvalidInput("Image data is not valid base64".to_string()))?;

    let mime_type = processor.sniff_mime(&bytes)?.to_string();

    Ok(ImagePayload { bytes, mime_type })
}

fn strip_data_url(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some((_, data)) = input.split_once(";base64,") {
            return data;
        }
    }
    input
}
