// src/errors.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds a client is told to wait after hitting the local rate limit.
pub const RETRY_AFTER_SECS: u64 = 3600;

/// Closed set of error codes shared by the API and the upload UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ApiKeyExpired,
    QuotaExceeded,
    FileTooLarge,
    InvalidFileType,
    NetworkError,
    TransformationFailed,
    ChatFailed,
    InvalidInput,
    Generic,
    ContentBlocked,
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDisplay {
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
    pub recoverable: bool,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ApiKeyExpired => "API_KEY_EXPIRED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::InvalidFileType => "INVALID_FILE_TYPE",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::TransformationFailed => "TRANSFORMATION_FAILED",
            ErrorCode::ChatFailed => "CHAT_FAILED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Generic => "GENERIC",
            ErrorCode::ContentBlocked => "CONTENT_BLOCKED",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    /// Parses a wire code; unknown codes fall back to `Generic`.
    pub fn from_wire(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.to_string()))
            .unwrap_or(ErrorCode::Generic)
    }

    /// User-facing copy for the code.
    pub fn display(&self) -> ErrorDisplay {
        let (title, message, action) = match self {
            ErrorCode::ApiKeyExpired => (
                "Authentication Error",
                "The API authentication has expired. Please contact support to resolve this issue.",
                "Contact Support",
            ),
            ErrorCode::QuotaExceeded => (
                "Rate Limit Reached",
                "You've reached the hourly limit for transformations (10 per hour). Please wait a bit and try again.",
                "Try Again Later",
            ),
            ErrorCode::FileTooLarge => (
                "File Too Large",
                "Your image exceeds the 10MB size limit. Please compress your image or choose a smaller file.",
                "Choose Different File",
            ),
            ErrorCode::InvalidFileType => (
                "Invalid File Type",
                "Only PNG, JPG, JPEG, and WebP image formats are supported. Please select a valid image file.",
                "Choose Different File",
            ),
            ErrorCode::NetworkError => (
                "Connection Problem",
                "Unable to reach the server. Please check your internet connection and try again.",
                "Retry",
            ),
            ErrorCode::TransformationFailed => (
                "Transformation Failed",
                "We couldn't transform your image. This might be due to image complexity or temporary service issues. Please try again.",
                "Try Again",
            ),
            ErrorCode::ChatFailed => (
                "Chat Unavailable",
                "The AI assistant is temporarily unavailable. Please try your question again in a moment.",
                "Try Again",
            ),
            ErrorCode::InvalidInput => (
                "Invalid Input",
                "The provided input is invalid or contains unsupported characters. Please check your input and try again.",
                "Fix Input",
            ),
            ErrorCode::ContentBlocked => (
                "Content Blocked",
                "Your request was blocked by the content policy. Please rephrase it and try again.",
                "Fix Input",
            ),
            ErrorCode::Generic | ErrorCode::ServerError => (
                "Something Went Wrong",
                "An unexpected error occurred. Please try again, or contact support if the problem persists.",
                "Try Again",
            ),
        };
        ErrorDisplay {
            title,
            message,
            action,
            recoverable: self.is_recoverable(),
        }
    }

    /// Codes where retrying the same input may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::TransformationFailed
                | ErrorCode::ChatFailed
                | ErrorCode::QuotaExceeded
        )
    }

    /// Codes where the user has to pick a new file or change the input.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ErrorCode::FileTooLarge
                | ErrorCode::InvalidFileType
                | ErrorCode::InvalidInput
                | ErrorCode::ContentBlocked
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Transform,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Transform => "transform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Auth,
    Quota,
    Network,
    ContentBlocked,
    Failed,
}

impl UpstreamErrorKind {
    /// Keyword classification for provider messages that carry no structured
    /// status. Case-sensitive, first match wins.
    pub fn classify(message: &str) -> Self {
        let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

        if has(&["not found", "API key"]) {
            UpstreamErrorKind::Auth
        } else if has(&["quota", "limit"]) {
            UpstreamErrorKind::Quota
        } else if has(&["network", "timeout"]) {
            UpstreamErrorKind::Network
        } else if has(&["safety", "blocked"]) {
            UpstreamErrorKind::ContentBlocked
        } else {
            UpstreamErrorKind::Failed
        }
    }
}

/// Failure of a call to the generative model provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error whose kind is derived from the message text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: UpstreamErrorKind::classify(&message),
            message,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Failed, message)
    }
}

#[derive(Error, Debug)]
pub enum SolaError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid file type. Only PNG, JPG, and WebP are supported.")]
    InvalidFileType,

    #[error("File too large. Maximum size is 10MB.")]
    FileTooLarge,

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error("Server configuration error. Please contact support.")]
    MissingCredential,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{endpoint:?} upstream failure: {source}")]
    Upstream {
        endpoint: Endpoint,
        source: UpstreamError,
    },
}

impl SolaError {
    pub fn upstream(endpoint: Endpoint, source: UpstreamError) -> Self {
        SolaError::Upstream { endpoint, source }
    }

    /// Wire code and client message. Upstream detail never leaks into the
    /// message.
    pub fn code_and_message(&self) -> (ErrorCode, String) {
        match self {
            SolaError::Redis(_) | SolaError::Serialization(_) => (
                ErrorCode::ServerError,
                "Internal server error. Please try again later.".to_string(),
            ),
            SolaError::InvalidInput(msg) => (ErrorCode::InvalidInput, msg.clone()),
            SolaError::InvalidFileType => (ErrorCode::InvalidFileType, self.to_string()),
            SolaError::FileTooLarge => (ErrorCode::FileTooLarge, self.to_string()),
            SolaError::RateLimited => (ErrorCode::QuotaExceeded, self.to_string()),
            SolaError::MissingCredential => (ErrorCode::ServerError, self.to_string()),
            SolaError::MethodNotAllowed => (ErrorCode::Generic, self.to_string()),
            SolaError::Upstream { endpoint, source } => {
                let (code, msg) = match (source.kind, endpoint) {
                    (UpstreamErrorKind::Auth, _) => (
                        ErrorCode::ApiKeyExpired,
                        "Authentication failed. Please contact support.",
                    ),
                    (UpstreamErrorKind::Quota, _) => (
                        ErrorCode::QuotaExceeded,
                        "API quota exceeded. Please try again later.",
                    ),
                    (UpstreamErrorKind::Network, _) => (
                        ErrorCode::NetworkError,
                        "Network error. Please check your connection and try again.",
                    ),
                    (UpstreamErrorKind::ContentBlocked, Endpoint::Chat) => (
                        ErrorCode::ContentBlocked,
                        "Message blocked due to content policy. Please rephrase your question.",
                    ),
                    (_, Endpoint::Chat) => (
                        ErrorCode::ChatFailed,
                        "Chat failed. Please try again or contact support if the issue persists.",
                    ),
                    (_, Endpoint::Transform) => (
                        ErrorCode::TransformationFailed,
                        "Transformation failed. Please try again or contact support if the issue persists.",
                    ),
                };
                (code, msg.to_string())
            }
        }
    }
}

impl ResponseError for SolaError {
    fn status_code(&self) -> StatusCode {
        match self {
            SolaError::Redis(_) | SolaError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SolaError::InvalidInput(_) | SolaError::InvalidFileType => StatusCode::BAD_REQUEST,
            SolaError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            SolaError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SolaError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            SolaError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SolaError::Upstream { .. } => match self.code_and_message().0 {
                ErrorCode::ApiKeyExpired => StatusCode::UNAUTHORIZED,
                ErrorCode::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                ErrorCode::NetworkError => StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ContentBlocked => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            SolaError::MethodNotAllowed => builder.json(serde_json::json!({
                "error": "Method not allowed"
            })),
            SolaError::RateLimited => {
                let (code, message) = self.code_and_message();
                builder.json(serde_json::json!({
                    "error": code,
                    "message": message,
                    "retryAfter": RETRY_AFTER_SECS
                }))
            }
            _ => {
                let (code, message) = self.code_and_message();
                builder.json(serde_json::json!({
                    "error": code,
                    "message": message
                }))
            }
        }
    }
}
