// src/services/gemini_service.rs
use crate::errors::{UpstreamError, UpstreamErrorKind};
use crate::models::{ChatTurn, ImagePayload, Role};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

const CHAT_SYSTEM_INSTRUCTION: &str = "You are an AI Design Consultant for Schroeder Technologies. You help explain UI/UX principles, dark mode accessibility (WCAG), and modern theme architectures. Be concise, helpful, and professional. Keep responses under 300 words.";

const TRANSFORM_PROMPT: &str = r#"Re-engineer this light-mode UI screenshot into a professional, high-fidelity dark-mode variant.

DESIGN SYSTEM REQUIREMENTS:
1. BASE SURFACE: Use a rich, deep grey palette (Zinc-950 #09090B). Use elevation-based lighting where components on top are slightly lighter grey.
2. TYPOGRAPHY: Ensure high legibility. Map dark text to White-900 (#F8FAFC) for headings and Slate-400 (#94A3B8) for body text.
3. COLOR VIBRANCY: Recalibrate brand colors (blues, purples, oranges) to look "vibrant" on dark backgrounds by adjusting their saturation and brightness to avoid 'visual buzzing'.
4. SHADOWS & DEPTH: Eliminate harsh drop shadows. Use 1px subtle borders (#FFFFFF10) and rim lighting for depth.
5. CONTEXTUAL SEARCH: Reference modern design trends for dashboards and SaaS applications to ensure the result looks cutting-edge.
6. ACCESSIBILITY: Strictly adhere to WCAG AA standards (4.5:1 ratio).

Return only the processed image. Result must look like an intentional dark theme design, not a simple inversion."#;

/// Finish reasons that mean the provider refused the content.
const BLOCKING_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
];

/// Seam between the HTTP handlers and the generative model provider.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn has_credential(&self) -> bool;

    /// Returns the model's text reply to the conversation.
    async fn chat(&self, turns: &[ChatTurn]) -> Result<String, UpstreamError>;

    /// Returns the base64 data of the first generated image.
    async fn transform(&self, image: &ImagePayload) -> Result<String, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub fn build_chat_request(turns: &[ChatTurn]) -> GenerateContentRequest {
    let contents = turns
        .iter()
        .map(|turn| Content {
            role: Some(
                match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: Some(turn.text.clone()),
                ..Default::default()
            }],
        })
        .collect();

    GenerateContentRequest {
        contents,
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part {
                text: Some(CHAT_SYSTEM_INSTRUCTION.to_string()),
                ..Default::default()
            }],
        }),
        generation_config: None,
        tools: None,
    }
}

pub fn build_transform_request(image: &ImagePayload) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type.clone(),
                        data: general_purpose::STANDARD.encode(&image.bytes),
                    }),
                    ..Default::default()
                },
                Part {
                    text: Some(TRANSFORM_PROMPT.to_string()),
                    ..Default::default()
                },
            ],
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: "1:1".to_string(),
                image_size: "1K".to_string(),
            }),
        }),
        tools: Some(vec![Tool {
            google_search: serde_json::json!({}),
        }]),
    }
}

fn check_blocked(response: &GenerateContentResponse) -> Result<(), UpstreamError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(UpstreamError::new(
            UpstreamErrorKind::ContentBlocked,
            format!("Prompt blocked: {}", reason),
        ));
    }

    if let Some(reason) = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
    {
        return Err(UpstreamError::new(
            UpstreamErrorKind::ContentBlocked,
            format!("Candidate blocked: {}", reason),
        ));
    }

    Ok(())
}

pub fn extract_text(response: &GenerateContentResponse) -> Result<String, UpstreamError> {
    check_blocked(response)?;

    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(UpstreamError::failed("Invalid API response"));
    }
    Ok(text)
}

pub fn extract_image(response: &GenerateContentResponse) -> Result<String, UpstreamError> {
    check_blocked(response)?;

    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .ok_or_else(|| UpstreamError::failed("Invalid API response structure"))?;

    parts
        .iter()
        .filter_map(|p| p.inline_data.as_ref())
        .map(|d| d.data.clone())
        .find(|d| !d.is_empty())
        .ok_or_else(|| UpstreamError::failed("No image data in API response"))
}

/// Assigns an error kind from the HTTP status, falling back to the
/// provider's message text.
pub fn classify_status(status: StatusCode, body: &str) -> UpstreamError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{} {}", envelope.error.status, envelope.error.message)
            .trim()
            .to_string(),
        Err(_) => body.to_string(),
    };
    let message = format!("HTTP {}: {}", status.as_u16(), message);

    let kind = match status.as_u16() {
        401 | 403 | 404 => UpstreamErrorKind::Auth,
        429 => UpstreamErrorKind::Quota,
        408 | 504 => UpstreamErrorKind::Network,
        _ => UpstreamErrorKind::classify(&message),
    };
    UpstreamError::new(kind, message)
}

fn classify_transport(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() || e.is_connect() {
        UpstreamError::new(UpstreamErrorKind::Network, format!("network error: {}", e))
    } else {
        UpstreamError::from_message(format!("request failed: {}", e))
    }
}

pub struct GeminiService {
    api_key: Option<String>,
    base_url: String,
    chat_model: String,
    image_model: String,
    client: Client,
}

impl GeminiService {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        chat_model: String,
        image_model: String,
    ) -> Self {
        Self {
            api_key,
            base_url,
            chat_model,
            image_model,
            client: Client::new(),
        }
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::new(UpstreamErrorKind::Auth, "API key not configured"))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::failed(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl GenerativeModel for GeminiService {
    fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn chat(&self, turns: &[ChatTurn]) -> Result<String, UpstreamError> {
        let request = build_chat_request(turns);
        let response = self.generate(&self.chat_model, &request).await?;
        extract_text(&response)
    }

    async fn transform(&self, image: &ImagePayload) -> Result<String, UpstreamError> {
        let request = build_transform_request(image);
        let response = self.generate(&self.image_model, &request).await?;
        extract_image(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn chat_request_keeps_turn_order_and_persona() {
        let turns = vec![
            ChatTurn {
                role: Role::User,
                text: "hi".to_string(),
            },
            ChatTurn {
                role: Role::Model,
                text: "hello".to_string(),
            },
            ChatTurn {
                role: Role::User,
                text: "contrast?".to_string(),
            },
        ];
        let json = serde_json::to_value(build_chat_request(&turns)).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "contrast?");
        let system = json["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.contains("300 words"));
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn transform_request_sends_image_then_brief() {
        let image = ImagePayload {
            bytes: vec![1, 2, 3],
            mime_type: "image/webp".to_string(),
        };
        let json = serde_json::to_value(build_transform_request(&image)).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert!(parts[1]["text"].as_str().unwrap().contains("4.5:1"));
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
        assert_eq!(json["tools"][0]["googleSearch"], json!({}));
    }

    #[test]
    fn first_inline_image_part_wins() {
        let resp = response(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "Rmlyc3Q="}},
                    {"inlineData": {"mimeType": "image/png", "data": "U2Vjb25k"}}
                ]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_image(&resp).unwrap(), "Rmlyc3Q=");
    }

    #[test]
    fn empty_candidates_or_text_only_fail() {
        let empty = response(json!({"candidates": []}));
        assert_eq!(
            extract_image(&empty).unwrap_err().kind,
            UpstreamErrorKind::Failed
        );

        let text_only = response(json!({
            "candidates": [{"content": {"parts": [{"text": "no image"}]}}]
        }));
        let err = extract_image(&text_only).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Failed);
        assert_eq!(err.message, "No image data in API response");
    }

    #[test]
    fn chat_text_is_joined_and_must_be_present() {
        let resp = response(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Use "}, {"text": "contrast."}]}}]
        }));
        assert_eq!(extract_text(&resp).unwrap(), "Use contrast.");

        let blank = response(json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]}));
        assert!(extract_text(&blank).is_err());
    }

    #[test]
    fn block_signals_are_content_blocked() {
        let prompt_blocked = response(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            extract_text(&prompt_blocked).unwrap_err().kind,
            UpstreamErrorKind::ContentBlocked
        );

        let finish_blocked = response(json!({
            "candidates": [{"finishReason": "IMAGE_SAFETY"}]
        }));
        assert_eq!(
            extract_image(&finish_blocked).unwrap_err().kind,
            UpstreamErrorKind::ContentBlocked
        );
    }

    #[test]
    fn status_codes_classify_at_origin() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind,
            UpstreamErrorKind::Quota
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "").kind,
            UpstreamErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, "").kind,
            UpstreamErrorKind::Network
        );

        let bad_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, bad_key).kind,
            UpstreamErrorKind::Auth
        );

        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops").kind,
            UpstreamErrorKind::Failed
        );
    }

    #[test]
    fn missing_key_reports_no_credential() {
        let service = GeminiService::new(
            None,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_CHAT_MODEL.to_string(),
            DEFAULT_IMAGE_MODEL.to_string(),
        );
        assert!(!service.has_credential());

        let empty = GeminiService::new(
            Some(String::new()),
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_CHAT_MODEL.to_string(),
            DEFAULT_IMAGE_MODEL.to_string(),
        );
        assert!(!empty.has_credential());
    }
}
