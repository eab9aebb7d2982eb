//! HTTP request handlers.

mod chat;
mod health;
pub mod response;
mod validate_id;

pub use chat::chat;
pub use health::health;
pub use validate_id::validate_id;
