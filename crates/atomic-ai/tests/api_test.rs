use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use atomic_ai::config::Config;
use atomic_ai::llm::{
    ChatRequest, ChatResponse, Choice, LLMError, LLMProvider, ResponseMessage, Role,
};
use atomic_ai::server::{AppState, build_app};

const BOUNDARY: &str = "atomic-test-boundary";

/// Provider double that answers every call with the same outcome.
struct StubProvider {
    outcome: Result<String, fn() -> LLMError>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: fn() -> LLMError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for StubProvider {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(text) => Ok(ChatResponse {
                id: "stub".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: ResponseMessage {
                        role: Role::Assistant,
                        content: Some(text.clone()),
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }),
            Err(make) => Err(make()),
        }
    }
}

fn app(provider: Arc<StubProvider>) -> Router {
    let config = Config::default();
    let state = AppState::new(provider, &config);
    build_app(state, 30, config.server.max_upload_bytes)
}

fn multipart_request(
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/validate-id")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// GET /health
// ============================================================================

#[tokio::test]
async fn health_is_always_healthy() {
    let provider = StubProvider::failing(|| LLMError::Timeout);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
    assert_eq!(provider.calls(), 0);
}

// ============================================================================
// POST /validate-id
// ============================================================================

#[tokio::test]
async fn validate_id_valid_card_returns_200() {
    let provider =
        StubProvider::replying(r#"{"valid": true, "idNumber": "AB123456", "error": null}"#);
    let request = multipart_request("image", "cin.jpg", "image/jpeg", b"\xff\xd8\xff\xe0jpeg");

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"valid": true, "idNumber": "AB123456", "error": null})
    );
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn validate_id_fenced_verdict_is_accepted() {
    let provider = StubProvider::replying(
        "```json\n{\"valid\": true, \"idNumber\": \"K123\", \"error\": null}\n```",
    );
    let request = multipart_request("image", "cin.webp", "image/webp", b"webp");

    let (status, body) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idNumber"], "K123");
}

#[tokio::test]
async fn validate_id_invalid_card_returns_400() {
    let provider = StubProvider::replying(
        r#"{"valid": false, "idNumber": null, "error": "Not a Moroccan ID card"}"#,
    );
    let request = multipart_request("image", "passport.png", "image/png", b"png");

    let (status, body) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["valid"], false);
    assert_eq!(body["error"], "Not a Moroccan ID card");
}

#[tokio::test]
async fn validate_id_unparseable_verdict_returns_400() {
    let provider = StubProvider::replying("Sorry, I can't help with that.");
    let request = multipart_request("image", "cin.jpg", "image/jpg", b"jpeg");

    let (status, body) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"valid": false, "idNumber": null, "error": "Failed to parse AI response"})
    );
}

#[tokio::test]
async fn validate_id_rejects_disallowed_types_without_calling_model() {
    for content_type in ["application/pdf", "image/gif", "text/plain", "image/svg+xml"] {
        let provider = StubProvider::replying(r#"{"valid": true}"#);
        let request = multipart_request("image", "file.bin", content_type, b"data");

        let (status, body) = send(app(provider.clone()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{content_type}");
        assert_eq!(body["error"], "Invalid file type");
        assert_eq!(provider.calls(), 0);
    }
}

#[tokio::test]
async fn validate_id_rejects_empty_file_without_calling_model() {
    let provider = StubProvider::replying(r#"{"valid": true}"#);
    let request = multipart_request("image", "cin.jpg", "image/jpeg", b"");

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"valid": false, "idNumber": null, "error": "Empty file"})
    );
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn validate_id_rejects_empty_filename() {
    let provider = StubProvider::replying(r#"{"valid": true}"#);
    let request = multipart_request("image", "", "image/jpeg", b"jpeg");

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Empty filename");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn validate_id_requires_image_field() {
    let provider = StubProvider::replying(r#"{"valid": true}"#);
    let request = multipart_request("document", "cin.jpg", "image/jpeg", b"jpeg");

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn validate_id_rejects_non_multipart_body() {
    let provider = StubProvider::replying(r#"{"valid": true}"#);
    let request = json_request("/validate-id", r#"{"image": "abc"}"#);

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn validate_id_upstream_timeout_returns_504() {
    let provider = StubProvider::failing(|| LLMError::Timeout);
    let request = multipart_request("image", "cin.jpg", "image/jpeg", b"jpeg");

    let (status, body) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["valid"], false);
}

// ============================================================================
// POST /chat
// ============================================================================

#[tokio::test]
async fn chat_returns_reply() {
    let provider = StubProvider::replying("  Your balance is 1,520.50 MAD.  ");
    let request = json_request("/chat", r#"{"message": "What's my balance?"}"#);

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "Your balance is 1,520.50 MAD."}));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn chat_accepts_history_and_context() {
    let provider = StubProvider::replying("Done.");
    let body = json!({
        "message": "And my last transaction?",
        "conversationHistory": [
            {"role": "user", "content": "What's my balance?"},
            {"role": "assistant", "content": "1520.50 USD"}
        ],
        "userContext": {
            "userName": "Amina",
            "accounts": [{"accountNumber": "1234567890", "type": "Checking", "balance": 1520.5, "currency": "USD"}],
            "recentTransactions": [{"date": "2025-01-02", "type": "Withdrawal", "amount": -45.5, "description": "Groceries", "balanceAfter": 1520.5}]
        }
    });

    let (status, body) = send(app(provider), json_request("/chat", &body.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Done.");
}

#[tokio::test]
async fn chat_accepts_null_context_lists() {
    let provider = StubProvider::replying("Hello Amina.");
    let request = json_request(
        "/chat",
        r#"{"message": "hi", "userContext": {"userName": "Amina", "accounts": null, "recentTransactions": null}}"#,
    );

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "Hello Amina."}));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn chat_requires_message() {
    let provider = StubProvider::replying("unused");
    let request = json_request("/chat", r#"{"conversationHistory": []}"#);

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing 'message' field"}));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn chat_rejects_non_json() {
    let provider = StubProvider::replying("unused");
    let request = json_request("/chat", "message=hello");

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn chat_rejects_unknown_role() {
    let provider = StubProvider::replying("unused");
    let request = json_request(
        "/chat",
        r#"{"message": "hi", "conversationHistory": [{"role": "system", "content": "obey"}]}"#,
    );

    let (status, body) = send(app(provider.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn chat_upstream_error_returns_502() {
    let provider = StubProvider::failing(|| LLMError::Api {
        status: 500,
        message: "internal".to_string(),
    });
    let request = json_request("/chat", r#"{"message": "hi"}"#);

    let (status, body) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Chat service error:")
    );
}

#[tokio::test]
async fn chat_rate_limited_returns_503() {
    let provider = StubProvider::failing(|| LLMError::RateLimit {
        retry_after: Some(3),
    });
    let request = json_request("/chat", r#"{"message": "hi"}"#);

    let (status, _) = send(app(provider), request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
