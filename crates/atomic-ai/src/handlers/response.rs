//! Shared error responses.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::llm::LLMError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    error(StatusCode::BAD_REQUEST, message)
}

pub fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Status code for a failed outbound model call.
pub fn upstream_status(err: &LLMError) -> StatusCode {
    match err {
        LLMError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        LLMError::RateLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LLMError::Request(_) | LLMError::Api { .. } | LLMError::Malformed(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}
