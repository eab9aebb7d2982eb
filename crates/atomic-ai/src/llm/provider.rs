//! LLM provider trait.

use async_trait::async_trait;

use super::error::LLMError;
use super::types::{ChatRequest, ChatResponse};

/// Trait for chat-completion backends.
///
/// Components hold an `Arc<dyn LLMProvider>` so tests can swap in a stub.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Make a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError>;
}
