//! ID card upload handler.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::response::upstream_status;
use crate::server::AppState;
use crate::validator::ValidationResult;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: axum::body::Bytes,
}

/// POST /validate-id
///
/// 200 with the verdict when the card is valid, 400 for bad uploads and for
/// cards the model judged invalid.
pub async fn validate_id(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Ok(multipart) = multipart else {
        return rejected("No image file provided");
    };

    let upload = match find_image(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return rejected("No image file provided"),
        Err(resp) => return resp,
    };

    if upload.file_name.as_deref().unwrap_or_default().is_empty() {
        return rejected("Empty filename");
    }

    let content_type = upload.content_type.unwrap_or_default();
    if !ALLOWED_TYPES.contains(&content_type.as_str()) {
        return rejected("Invalid file type");
    }

    if upload.bytes.is_empty() {
        return rejected("Empty file");
    }

    match state.validator.validate(&upload.bytes, &content_type).await {
        Ok(result) => {
            let status = if result.valid {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(result)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "ID validation request failed");
            let body = ValidationResult::rejected(format!("Validation service error: {e}"));
            (upstream_status(&e), Json(body)).into_response()
        }
    }
}

/// Read fields until the image field is found.
async fn find_image(mut multipart: Multipart) -> Result<Option<Upload>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(multipart_error(e)),
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(Upload {
            file_name,
            content_type,
            bytes,
        }));
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> Response {
    tracing::debug!(error = %err, "Rejected multipart body");
    (
        err.status(),
        Json(ValidationResult::rejected("Invalid multipart body")),
    )
        .into_response()
}

fn rejected(error: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ValidationResult::rejected(error))).into_response()
}
