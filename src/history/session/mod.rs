//! Per-session logs and the registry that owns them.

pub mod conversation_log;
pub mod registry;

pub use conversation_log::{ConversationLog, ConversationStore};
pub use registry::{SessionHandle, SessionRegistry};
