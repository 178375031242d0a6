use std::net::TcpListener;
use std::sync::Mutex;

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};

use sola::errors::UpstreamErrorKind;
use sola::models::{ChatTurn, ImagePayload, Role};
use sola::services::{GeminiService, GenerativeModel};

const API_KEY: &str = "test-gemini-key";

struct Captured {
    path: String,
    api_key: Option<String>,
    body: Value,
}

/// Stand-in for the Gemini REST endpoint: records every call and answers
/// with a fixed status and JSON body.
struct Upstream {
    status: StatusCode,
    reply: Value,
    seen: Mutex<Vec<Captured>>,
}

async fn record(req: HttpRequest, body: web::Bytes, upstream: web::Data<Upstream>) -> HttpResponse {
    upstream.seen.lock().unwrap().push(Captured {
        path: req.path().to_string(),
        api_key: req
            .headers()
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    HttpResponse::build(upstream.status).json(&upstream.reply)
}

struct FakeGemini {
    base_url: String,
    upstream: web::Data<Upstream>,
    handle: ServerHandle,
}

impl FakeGemini {
    async fn start(status: StatusCode, reply: Value) -> Self {
        let upstream = web::Data::new(Upstream {
            status,
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let data = upstream.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .default_service(web::to(record))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}", addr),
            upstream,
            handle,
        }
    }

    fn service(&self) -> GeminiService {
        GeminiService::new(
            Some(API_KEY.to_string()),
            // Trailing slash must not produce `//v1beta`.
            format!("{}/", self.base_url),
            "chat-model".to_string(),
            "image-model".to_string(),
        )
    }

    fn calls(&self) -> usize {
        self.upstream.seen.lock().unwrap().len()
    }

    async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn turns() -> Vec<ChatTurn> {
    vec![
        ChatTurn {
            role: Role::Model,
            text: "Hello, how can I help?".to_string(),
        },
        ChatTurn {
            role: Role::User,
            text: "Which grey for dark surfaces?".to_string(),
        },
    ]
}

fn png() -> ImagePayload {
    ImagePayload {
        bytes: b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01".to_vec(),
        mime_type: "image/png".to_string(),
    }
}

#[actix_web::test]
async fn chat_posts_to_generate_content_with_key_header() {
    let fake = FakeGemini::start(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Use #18181B."}]}}]}),
    )
    .await;

    let answer = fake.service().chat(&turns()).await.unwrap();
    assert_eq!(answer, "Use #18181B.");

    {
        let seen = fake.upstream.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let call = &seen[0];
        assert_eq!(call.path, "/v1beta/models/chat-model:generateContent");
        assert_eq!(call.api_key.as_deref(), Some(API_KEY));

        let contents = call.body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[1]["parts"][0]["text"], "Which grey for dark surfaces?");
        assert!(call.body["systemInstruction"]["parts"][0]["text"].is_string());
    }

    fake.stop().await;
}

#[actix_web::test]
async fn transform_returns_inline_image_data() {
    let fake = FakeGemini::start(
        StatusCode::OK,
        json!({"candidates": [{"content": {"parts": [
            {"text": "Here is the dark variant."},
            {"inlineData": {"mimeType": "image/png", "data": "ZGFyaw=="}}
        ]}}]}),
    )
    .await;

    let image = png();
    let encoded = fake.service().transform(&image).await.unwrap();
    assert_eq!(encoded, "ZGFyaw==");

    {
        let seen = fake.upstream.seen.lock().unwrap();
        let call = &seen[0];
        assert_eq!(call.path, "/v1beta/models/image-model:generateContent");
        assert_eq!(call.api_key.as_deref(), Some(API_KEY));
        let inline = &call.body["contents"][0]["parts"][0]["inlineData"];
        assert_eq!(inline["mimeType"], "image/png");
        assert_eq!(inline["data"], general_purpose::STANDARD.encode(&image.bytes));
        assert_eq!(call.body["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    fake.stop().await;
}

#[actix_web::test]
async fn rate_limited_upstream_is_quota() {
    let fake = FakeGemini::start(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
    )
    .await;

    let err = fake.service().chat(&turns()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Quota);
    assert!(err.message.contains("Resource has been exhausted"));

    let err = fake.service().transform(&png()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Quota);
    assert_eq!(fake.calls(), 2);

    fake.stop().await;
}

#[actix_web::test]
async fn forbidden_upstream_is_auth() {
    let fake = FakeGemini::start(
        StatusCode::FORBIDDEN,
        json!({"error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}}),
    )
    .await;

    let err = fake.service().chat(&turns()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Auth);

    fake.stop().await;
}

#[actix_web::test]
async fn blocked_prompt_is_content_blocked() {
    let fake = FakeGemini::start(
        StatusCode::OK,
        json!({"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}),
    )
    .await;

    let err = fake.service().chat(&turns()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::ContentBlocked);

    fake.stop().await;
}

#[actix_web::test]
async fn unreachable_upstream_is_network() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let service = GeminiService::new(
        Some(API_KEY.to_string()),
        format!("http://127.0.0.1:{}", port),
        "chat-model".to_string(),
        "image-model".to_string(),
    );

    let err = service.chat(&turns()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Network);

    let err = service.transform(&png()).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Network);
}
