use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::chat::{ChatAssistant, ChatSettings};
use crate::config::Config;
use crate::handlers;
use crate::llm::LLMProvider;
use crate::validator::IdValidator;

/// Shared application state. Read-only after start-up.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<IdValidator>,
    pub assistant: Arc<ChatAssistant>,
}

impl AppState {
    /// Wire both components to one provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &Config) -> Self {
        let validator = IdValidator::new(
            provider.clone(),
            config.llm.vision_model.clone(),
            config.validator.max_tokens,
        );
        let assistant = ChatAssistant::new(
            provider,
            ChatSettings {
                model: config.llm.chat_model.clone(),
                max_tokens: config.chat.max_tokens,
                temperature: config.chat.temperature,
                max_history_turns: config.chat.max_history_turns,
            },
        );

        Self {
            validator: Arc::new(validator),
            assistant: Arc::new(assistant),
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/validate-id", post(handlers::validate_id))
        .route("/chat", post(handlers::chat))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
