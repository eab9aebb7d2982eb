//! OpenAI-compatible LLM provider.
//!
//! Works with OpenAI, OpenRouter, and the fal.ai OpenRouter proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::error::{LLMError, check_response_error};
use super::provider::LLMProvider;
use super::types::{ChatRequest, ChatResponse};

/// How the API key is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (OpenAI, OpenRouter)
    Bearer,
    /// `Authorization: Key <key>` (fal.ai)
    #[default]
    Key,
}

impl AuthScheme {
    fn header_value(self, key: &str) -> String {
        match self {
            AuthScheme::Bearer => format!("Bearer {key}"),
            AuthScheme::Key => format!("Key {key}"),
        }
    }
}

/// OpenAI-compatible provider.
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    auth_scheme: AuthScheme,
}

impl OpenAICompatibleProvider {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        auth_scheme: AuthScheme,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_scheme,
        }
    }

    /// Build a reqwest client with explicit connect and total timeouts.
    pub fn build_client(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Client, LLMError> {
        Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(LLMError::Request)
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", self.auth_scheme.header_value(key));
        }

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion"
        );

        let response = req.json(&request).send().await?;

        if let Some(err) = check_response_error(&response) {
            return Err(err);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LLMError::Api { status, message });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if parsed.choices.is_empty() {
            return Err(LLMError::Malformed(
                "response contained no choices".to_string(),
            ));
        }

        Ok(parsed)
    }
}
