//! LLM error types.

use thiserror::Error;

/// Check an HTTP response for rate-limit errors, returning `RateLimit` for 429.
pub fn check_response_error(response: &reqwest::Response) -> Option<LLMError> {
    if response.status().is_success() {
        return None;
    }
    if response.status().as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Some(LLMError::RateLimit { retry_after });
    }
    None
}

/// Errors that can occur when making LLM API calls.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Network-level failure (connect, TLS, broken body)
    #[error("http request failed: {0}")]
    Request(reqwest::Error),

    /// The request did not complete within the client timeout
    #[error("request timed out")]
    Timeout,

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited (429)
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimit { retry_after: Option<u64> },

    /// The response envelope could not be used (bad JSON, no choices, no content)
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout
        } else {
            LLMError::Request(err)
        }
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::Malformed(err.to_string())
    }
}
