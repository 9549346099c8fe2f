//! Per-session conversation log with retention and inference windows.
//!
//! A [`ConversationLog`] always starts with exactly one system turn holding
//! the pinned directive, followed by at most `retention_limit` conversation
//! turns. Every mutation rewrites the whole record through the
//! [`HistoryBackend`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::history::core::config::HistoryConfig;
use crate::history::core::errors::{HistoryError, HistoryResult, LoadError};
use crate::history::core::ids::SessionKey;
use crate::history::core::turn::{Turn, TurnRole, WindowMessage};
use crate::history::storage::history_file::{HistoryBackend, JsonFileBackend};

/// Factory and persistence owner for conversation logs.
///
/// Cheap to clone; every log keeps a clone so it can persist itself.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn HistoryBackend>,
    directive: Arc<str>,
    retention_limit: usize,
}

impl ConversationStore {
    /// Create a store writing JSON records under `config.chat_dir`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the directory cannot be created.
    pub fn new(config: &HistoryConfig) -> HistoryResult<Self> {
        let backend = JsonFileBackend::new(&config.chat_dir)?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// Create a store on top of an arbitrary backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_backend(
        config: &HistoryConfig,
        backend: Arc<dyn HistoryBackend>,
    ) -> HistoryResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            directive: Arc::from(config.system_directive.as_str()),
            retention_limit: config.retention_limit,
        })
    }

    /// The fixed directive used to seed new logs.
    #[must_use]
    pub fn system_directive(&self) -> &str {
        &self.directive
    }

    /// Conversation turns kept per log.
    #[must_use]
    pub const fn retention_limit(&self) -> usize {
        self.retention_limit
    }

    /// Load the log for `session_id`, never failing.
    ///
    /// Missing or unreadable records yield a fresh log holding only the
    /// system turn. Only a missing record is initialized on disk; an
    /// unreadable one is left in place until the next append or reset. Stored records are normalized: one system turn at index 0, no
    /// empty conversation turns, at most `retention_limit` conversation turns.
    #[must_use]
    pub fn load(&self, session_id: SessionKey) -> ConversationLog {
        match self.backend.load(&session_id) {
            Ok(stored) => {
                let log = ConversationLog {
                    turns: self.normalize(stored),
                    session_id,
                    store: self.clone(),
                };
                debug!(
                    "Loaded {} turns for session {}",
                    log.conversation_len(),
                    log.session_id
                );
                log
            }
            Err(err) => {
                let log = ConversationLog {
                    turns: vec![self.system_turn()],
                    session_id,
                    store: self.clone(),
                };
                match err {
                    LoadError::Missing => {
                        info!("Starting new history for session {}", log.session_id);
                        if let Err(persist_err) = log.persist() {
                            warn!(
                                "Failed to write initial history for session {}: {persist_err}",
                                log.session_id
                            );
                        }
                    }
                    // The record stays on disk until the next successful write.
                    LoadError::Io(_) | LoadError::Parse(_) => {
                        warn!(
                            "Ignoring stored history for session {}: {err}",
                            log.session_id
                        );
                    }
                }
                log
            }
        }
    }

    fn system_turn(&self) -> Turn {
        Turn::system(self.directive.as_ref())
    }

    fn normalize(&self, stored: Vec<Turn>) -> Vec<Turn> {
        let mut stored = stored.into_iter().peekable();
        let system = match stored.peek() {
            Some(first) if first.role == TurnRole::System && !first.content.trim().is_empty() => {
                stored.next()
            }
            _ => None,
        }
        .unwrap_or_else(|| self.system_turn());

        let conversation: Vec<Turn> = stored
            .filter(|turn| turn.role.is_conversation() && !turn.content.trim().is_empty())
            .collect();
        let skip = conversation.len().saturating_sub(self.retention_limit);

        let mut turns = Vec::with_capacity(conversation.len() - skip + 1);
        turns.push(system);
        turns.extend(conversation.into_iter().skip(skip));
        turns
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("retention_limit", &self.retention_limit)
            .finish_non_exhaustive()
    }
}

/// One session's ordered, bounded, durable turn sequence.
#[derive(Debug)]
pub struct ConversationLog {
    session_id: SessionKey,
    turns: Vec<Turn>,
    store: ConversationStore,
}

impl ConversationLog {
    /// Session this log belongs to.
    #[must_use]
    pub const fn session_id(&self) -> &SessionKey {
        &self.session_id
    }

    /// All turns, system turn first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The pinned system turn.
    #[must_use]
    pub fn system_turn(&self) -> &Turn {
        &self.turns[0]
    }

    /// Number of non-system turns.
    #[must_use]
    pub fn conversation_len(&self) -> usize {
        self.turns.len() - 1
    }

    /// Append a user or assistant turn, evict the oldest conversation turns
    /// beyond the retention limit, then persist the whole log.
    ///
    /// # Errors
    /// Returns [`HistoryError::InvalidTurn`] for system or empty turns (the log
    /// is left untouched), or [`HistoryError::Persistence`] if the write failed
    /// (the in-memory log already holds the new turn).
    pub fn append(&mut self, role: TurnRole, content: impl Into<String>) -> HistoryResult<()> {
        let content = content.into();
        if !role.is_conversation() {
            return Err(HistoryError::InvalidTurn(
                "the system turn can only change through reset".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(HistoryError::InvalidTurn(format!("{role} content is empty")));
        }

        self.turns.push(Turn::new(role, content));
        let evicted = self.enforce_retention();
        if evicted > 0 {
            debug!(
                "Evicted {evicted} oldest turns from session {}",
                self.session_id
            );
        }

        self.persist()
    }

    /// System turn followed by at most `max_conversation_turns` most recent
    /// conversation turns, in chronological order, without timestamps.
    #[must_use]
    pub fn build_inference_window(&self, max_conversation_turns: usize) -> Vec<WindowMessage> {
        let conversation = &self.turns[1..];
        let start = conversation.len().saturating_sub(max_conversation_turns);

        let mut window = Vec::with_capacity(conversation.len() - start + 1);
        window.push(self.system_turn().to_message());
        window.extend(conversation[start..].iter().map(Turn::to_message));
        window
    }

    /// Reduce the log to its system turn and persist.
    ///
    /// # Errors
    /// Returns [`HistoryError::Persistence`] if the write failed; the log is
    /// reset in memory either way.
    pub fn reset(&mut self) -> HistoryResult<()> {
        let system = self
            .turns
            .drain(..)
            .find(|turn| turn.role == TurnRole::System)
            .unwrap_or_else(|| self.store.system_turn());
        self.turns.push(system);
        info!("Cleared history for session {}", self.session_id);
        self.persist()
    }

    /// Conversation turns for display, oldest first.
    #[must_use]
    pub fn display_history(&self) -> Vec<Turn> {
        self.turns[1..].to_vec()
    }

    /// Rewrite the durable record from the in-memory log.
    ///
    /// # Errors
    /// Returns [`HistoryError::Persistence`] if the write failed.
    pub fn persist(&self) -> HistoryResult<()> {
        self.store.backend.save(&self.session_id, &self.turns)
    }

    fn enforce_retention(&mut self) -> usize {
        let limit = self.store.retention_limit;
        let excess = self.conversation_len().saturating_sub(limit);
        if excess > 0 {
            self.turns.drain(1..=excess);
        }
        excess
    }
}
