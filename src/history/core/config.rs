//! Configuration for the conversation-history subsystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::history::core::errors::{HistoryError, HistoryResult};

/// Default number of conversation turns kept per session.
pub const DEFAULT_RETENTION_LIMIT: usize = 15;

/// Default number of conversation turns submitted for inference.
pub const DEFAULT_INFERENCE_WINDOW: usize = 10;

/// Directive pinned at the head of every conversation.
pub const DEFAULT_SYSTEM_DIRECTIVE: &str = "You are an expert on small fishes in Bangladesh.
Your ONLY purpose is to answer questions about small fishes found in Bangladesh.
You MUST follow these rules STRICTLY:
1. ONLY answer questions about small fishes in Bangladesh
2. For any question NOT about small fishes in Bangladesh, respond: \"Sorry, I can only answer questions about small fishes in Bangladesh. Please ask about small fishes.\"
3. Do not engage in any other conversation topics
4. Do not answer questions about other countries' fishes unless specifically compared to Bangladesh
5. Stay strictly on topic at all times

Examples of acceptable questions:
- \"What are the common small fishes in Bangladesh?\"
- \"Tell me about Puti fish\"
- \"How are small fishes farmed in Bangladesh?\"

Examples of unacceptable questions (you must politely refuse):
- \"What's the weather like today?\" → \"Sorry, I can only answer questions about small fishes in Bangladesh.\"
- \"Tell me a joke\" → \"Sorry, I can only answer questions about small fishes in Bangladesh.\"
- \"What about sharks?\" → \"Sorry, sharks are not small fishes. I can only answer about small fishes in Bangladesh.\"
";

/// Settings for per-session history logs and the registry holding them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Conversation turns kept after eviction (the system turn is extra).
    pub retention_limit: usize,
    /// Conversation turns submitted to the completion provider.
    pub inference_window: usize,
    /// Directory holding one JSON record per session.
    pub chat_dir: PathBuf,
    /// Directive text for the pinned system turn.
    pub system_directive: String,
    /// Optional cap on live sessions held by the registry.
    pub max_sessions: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_limit: DEFAULT_RETENTION_LIMIT,
            inference_window: DEFAULT_INFERENCE_WINDOW,
            chat_dir: PathBuf::from("chat"),
            system_directive: DEFAULT_SYSTEM_DIRECTIVE.to_string(),
            max_sessions: None,
        }
    }
}

impl HistoryConfig {
    /// Default settings rooted at `chat_dir`.
    #[must_use]
    pub fn with_chat_dir(chat_dir: impl Into<PathBuf>) -> Self {
        Self {
            chat_dir: chat_dir.into(),
            ..Self::default()
        }
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.retention_limit == 0 {
            return Err(HistoryError::InvalidConfig(
                "history.retention_limit must be > 0".to_string(),
            ));
        }

        if self.inference_window == 0 {
            return Err(HistoryError::InvalidConfig(
                "history.inference_window must be > 0".to_string(),
            ));
        }

        if self.inference_window > self.retention_limit {
            return Err(HistoryError::InvalidConfig(format!(
                "history.inference_window ({}) must not exceed retention_limit ({})",
                self.inference_window, self.retention_limit
            )));
        }

        if self.system_directive.trim().is_empty() {
            return Err(HistoryError::InvalidConfig(
                "history.system_directive must not be empty".to_string(),
            ));
        }

        if self.max_sessions == Some(0) {
            return Err(HistoryError::InvalidConfig(
                "history.max_sessions must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}
