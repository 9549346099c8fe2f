//! Completion providers consumed by the chat service.

pub mod completion;
pub mod groq_chat;

pub use completion::{API_KEY_ENV, CompletionProvider, LlmConfig, ProviderError};
pub use groq_chat::GroqChat;
