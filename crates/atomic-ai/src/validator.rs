//! National ID card validation via a vision model.
//!
//! The image is sent as a base64 `data:` URL alongside a fixed instruction
//! asking the model for a JSON verdict. The verdict is parsed leniently:
//! markdown fences are stripped, and anything that still is not a JSON object
//! becomes an invalid result instead of an error.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use crate::llm::{
    ChatRequest, Content, ContentPart, ImageUrl, LLMError, LLMProvider, Message, Role,
};

/// Error reported when the model's verdict cannot be parsed.
pub const PARSE_FAILURE: &str = "Failed to parse AI response";

const SYSTEM_PROMPT: &str = "You are an ID card verification system. You analyze images of identification documents. \
You must determine if the image is a valid Moroccan البطاقة الوطنية (Carte Nationale d'Identité). \
If it is, extract the CIN number (usually 1-2 letters followed by digits, e.g. AB123456). \
Respond ONLY with valid JSON, no markdown, no explanation.";

const USER_PROMPT: &str = "Analyze this image. Is it a Moroccan البطاقة الوطنية (national ID card)? \
Look for indicators like: 'البطاقة الوطنية', 'CARTE NATIONALE', 'ROYAUME DU MAROC', 'المملكة المغربية'. \
If valid, extract the CIN number. \
Respond with JSON: {\"valid\": true/false, \"idNumber\": \"XX123456\" or null, \"error\": null or \"reason\"}";

/// Outcome of an ID validation, serialized as the public response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub id_number: Option<String>,
    pub error: Option<String>,
}

impl ValidationResult {
    /// An invalid result carrying only an error message.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            id_number: None,
            error: Some(error.into()),
        }
    }

    pub fn parse_failure() -> Self {
        Self::rejected(PARSE_FAILURE)
    }
}

/// Sends ID card images to a vision model and interprets the verdict.
pub struct IdValidator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: u32,
}

impl IdValidator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    /// Validate an ID card image.
    ///
    /// Malformed model output yields `Ok` with a parse-failure result; only
    /// outbound failures are returned as `Err`.
    pub async fn validate(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<ValidationResult, LLMError> {
        let request = self.build_request(image, content_type);
        let response = self.provider.chat(request).await?;

        let raw = response.first_text().unwrap_or_default();
        let result = parse_verdict(raw);

        if result.error.as_deref() == Some(PARSE_FAILURE) {
            tracing::warn!(raw = %raw, "Vision model returned an unparseable verdict");
        } else {
            tracing::info!(valid = result.valid, "ID card validated");
        }

        Ok(result)
    }

    fn build_request(&self, image: &[u8], content_type: &str) -> ChatRequest {
        let data_url = format!(
            "data:{};base64,{}",
            normalize_media_type(content_type),
            STANDARD.encode(image)
        );

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message {
                    role: Role::User,
                    content: Content::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url,
                                detail: Some("high".to_string()),
                            },
                        },
                    ]),
                },
            ],
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
        }
    }
}

fn normalize_media_type(content_type: &str) -> &str {
    match content_type {
        "image/jpg" => "image/jpeg",
        other => other,
    }
}

/// Remove surrounding markdown code fences (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => trimmed.trim_start_matches('`'),
    };
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

/// Interpret the model's text output as a [`ValidationResult`].
pub fn parse_verdict(raw: &str) -> ValidationResult {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(strip_code_fences(raw)) else {
        return ValidationResult::parse_failure();
    };

    let valid = match map.get("valid") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    ValidationResult {
        valid,
        id_number: text("idNumber"),
        error: text("error"),
    }
}
