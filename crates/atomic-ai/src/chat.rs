//! Banking assistant chat.

use std::sync::Arc;

use serde::Deserialize;

use crate::context::{UserContext, render_context};
use crate::llm::{ChatRequest, LLMError, LLMProvider, Message};

const SYSTEM_PROMPT: &str = "You are Atomic Bank's AI banking assistant. You help customers with their banking questions. \
You have access to the customer's account information and transaction history provided below. \
Use this data to answer questions about their balance, recent transactions, spending patterns, etc. \
Be concise, helpful, and professional. If asked about something outside banking, politely redirect. \
Always respond in the same language the user writes in (Arabic, French, or English). \
Never reveal sensitive details like full account numbers - use masked versions (e.g. ***1234). \
Amounts are in USD unless stated otherwise.";

/// A prior conversation turn supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Roles a caller may use in history. System turns are not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Generation settings for the assistant.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Most recent turns to forward; `0` forwards everything.
    pub max_history_turns: usize,
}

/// Context-aware banking assistant.
pub struct ChatAssistant {
    provider: Arc<dyn LLMProvider>,
    settings: ChatSettings,
}

impl ChatAssistant {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: ChatSettings) -> Self {
        Self { provider, settings }
    }

    /// Answer `message` given prior turns and the customer's banking snapshot.
    pub async fn reply(
        &self,
        message: &str,
        history: &[ChatTurn],
        context: &UserContext,
    ) -> Result<String, LLMError> {
        let request = self.build_request(message, history, context);
        let response = self.provider.chat(request).await?;

        let reply = response
            .first_text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LLMError::Malformed("empty assistant reply".to_string()))?;

        Ok(reply.to_string())
    }

    fn build_request(
        &self,
        message: &str,
        history: &[ChatTurn],
        context: &UserContext,
    ) -> ChatRequest {
        let history = self.recent_history(history);

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(SYSTEM_PROMPT));
        messages.push(Message::system(format!(
            "Customer data:\n{}",
            render_context(context)
        )));

        for turn in history {
            messages.push(match turn.role {
                TurnRole::User => Message::user(turn.content.clone()),
                TurnRole::Assistant => Message::assistant(turn.content.clone()),
            });
        }

        messages.push(Message::user(message));

        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
        }
    }

    fn recent_history<'a>(&self, history: &'a [ChatTurn]) -> &'a [ChatTurn] {
        let cap = self.settings.max_history_turns;
        if cap == 0 || history.len() <= cap {
            return history;
        }
        let dropped = history.len() - cap;
        tracing::debug!(dropped, kept = cap, "Truncating conversation history");
        &history[dropped..]
    }
}
