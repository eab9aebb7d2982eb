//! LLM provider client for chat completions.

mod error;
mod openai;
mod provider;
mod types;

pub use error::LLMError;
pub use openai::{AuthScheme, OpenAICompatibleProvider};
pub use provider::LLMProvider;
pub use types::{
    ChatRequest, ChatResponse, Choice, Content, ContentPart, ImageUrl, Message, ResponseMessage,
    Role, Usage,
};
