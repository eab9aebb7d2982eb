use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
