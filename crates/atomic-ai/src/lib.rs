//! atomic-ai - ID card validation and a banking assistant on top of a hosted
//! OpenAI-compatible model.

pub mod chat;
pub mod config;
pub mod context;
pub mod handlers;
pub mod llm;
pub mod server;
pub mod validator;
