// src/models.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Only the exact literal `"model"` is a model turn.
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw {
            Some("model") => Role::Model,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

/// Sanitized conversation, history first and the new message last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub turns: Vec<ChatTurn>,
}

/// Decoded image ready to be sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Loosely-typed chat body; field types are checked by the validator.
#[derive(Debug, Default, Deserialize)]
pub struct RawChatRequest {
    pub history: Option<serde_json::Value>,
    pub message: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransformRequest {
    pub base64_image: Option<serde_json::Value>,
    pub mime_type: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformResponse {
    pub success: bool,
    pub result: String,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub count: u32,
    #[serde(rename = "resetTimeEpochMs")]
    pub reset_time_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}
