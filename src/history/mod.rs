//! Conversation-history cache for the fish chatbot.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, session ids and the turn model
//! - `storage`: Durable per-session JSON records with atomic replacement
//! - `session`: Bounded per-session logs and the registry sharing them

pub mod core;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use self::core::{
    DEFAULT_INFERENCE_WINDOW, DEFAULT_RETENTION_LIMIT, DEFAULT_SESSION, DEFAULT_SYSTEM_DIRECTIVE,
    HistoryConfig, HistoryError, HistoryResult, LoadError, SessionKey, SessionKeyError, Turn,
    TurnRole, WindowMessage,
};
pub use session::{ConversationLog, ConversationStore, SessionHandle, SessionRegistry};
pub use storage::{HistoryBackend, JsonFileBackend};
