//! Banking assistant chat handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::response::{self, upstream_status};
use crate::chat::ChatTurn;
use crate::context::UserContext;
use crate::server::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    message: Option<String>,
    conversation_history: Option<Vec<ChatTurn>>,
    user_context: Option<UserContext>,
}

#[derive(Serialize)]
pub struct ChatReply {
    reply: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected chat body");
            return response::bad_request(rejection.body_text()).into_response();
        }
    };

    let Some(message) = body.message else {
        return response::bad_request("Missing 'message' field").into_response();
    };

    let history = body.conversation_history.unwrap_or_default();
    let context = body.user_context.unwrap_or_default();

    match state.assistant.reply(&message, &history, &context).await {
        Ok(reply) => (StatusCode::OK, Json(ChatReply { reply })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, turns = history.len(), "Chat request failed");
            response::error(upstream_status(&e), format!("Chat service error: {e}"))
                .into_response()
        }
    }
}
