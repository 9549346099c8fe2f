//! Chat orchestration over the session registry and a completion provider.
//!
//! The user turn is recorded before the provider is called and the assistant
//! turn only after a successful reply, so a failed call leaves a log that
//! simply lacks the answer and can be retried.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::SessionKey;
use crate::history::core::turn::{Turn, TurnRole};
use crate::history::session::registry::SessionRegistry;
use crate::llm::completion::{CompletionProvider, ProviderError};

/// Errors surfaced by [`ChatService`].
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request could not be recorded.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// The completion provider failed; history keeps the user turn.
    #[error("completion failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Assistant reply for one chat request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatReply {
    /// Session the reply belongs to.
    pub session_id: SessionKey,
    /// Assistant text.
    pub response: String,
    /// Whether every history write for this exchange reached disk.
    pub persisted: bool,
}

/// Runs chat turns against per-session history.
pub struct ChatService {
    registry: Arc<SessionRegistry>,
    provider: Arc<dyn CompletionProvider>,
    inference_window: usize,
}

impl ChatService {
    /// Create a chat service.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        provider: Arc<dyn CompletionProvider>,
        inference_window: usize,
    ) -> Self {
        Self {
            registry,
            provider,
            inference_window,
        }
    }

    /// Registry holding the session logs.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Model used for replies.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// The fixed directive seeding every session.
    #[must_use]
    pub fn system_directive(&self) -> &str {
        self.registry.store().system_directive()
    }

    /// Record `message`, ask the provider for a reply, and record the reply.
    ///
    /// Persistence failures are logged and reported through
    /// [`ChatReply::persisted`] rather than failing the request.
    ///
    /// # Errors
    /// Returns [`ChatError::History`] if the message is rejected, or
    /// [`ChatError::Provider`] if no reply could be obtained.
    pub fn respond(&self, session_id: &SessionKey, message: &str) -> Result<ChatReply, ChatError> {
        let session = self.registry.get_or_create(session_id);
        let mut persisted = true;

        let window = session.with_log(|log| {
            let appended = log.append(TurnRole::User, message);
            persisted &= tolerate_persistence(session_id, appended)?;
            debug!(
                "Session {session_id}: {} turns retained, sending 1 system + {} conversation",
                log.conversation_len(),
                log.conversation_len().min(self.inference_window)
            );
            Ok::<_, HistoryError>(log.build_inference_window(self.inference_window))
        })?;

        let response = self.provider.complete(&window).map_err(|err| {
            error!("Completion failed for session {session_id}: {err}");
            err
        })?;

        let appended = session.append(TurnRole::Assistant, response.as_str());
        persisted &= tolerate_persistence(session_id, appended)?;

        Ok(ChatReply {
            session_id: session_id.clone(),
            response,
            persisted,
        })
    }

    /// Clear a session back to its system turn.
    ///
    /// # Errors
    /// Returns an error if the cleared log could not be persisted.
    pub fn clear(&self, session_id: &SessionKey) -> HistoryResult<()> {
        self.registry.get_or_create(session_id).reset()
    }

    /// Conversation turns of a session, oldest first.
    #[must_use]
    pub fn history(&self, session_id: &SessionKey) -> Vec<Turn> {
        self.registry.get_or_create(session_id).display_history()
    }
}

/// Downgrade a persistence failure to a warning; returns whether the write landed.
fn tolerate_persistence(session_id: &SessionKey, result: HistoryResult<()>) -> HistoryResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_persistence() => {
            warn!("Serving session {session_id} from memory: {err}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::history::core::config::HistoryConfig;
    use crate::history::core::errors::LoadError;
    use crate::history::core::turn::WindowMessage;
    use crate::history::session::conversation_log::ConversationStore;
    use crate::history::storage::history_file::{HistoryBackend, JsonFileBackend};

    /// Provider that echoes the last message or fails on demand.
    struct ScriptedProvider {
        failing: AtomicBool,
        seen: Mutex<Vec<Vec<WindowMessage>>>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                failing: AtomicBool::new(false),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionProvider for ScriptedProvider {
        fn complete(&self, messages: &[WindowMessage]) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::HttpStatus {
                    status: 503,
                    body: "overloaded".to_string(),
                });
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("about: {last}"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct ReadOnlyBackend {
        inner: JsonFileBackend,
    }

    impl HistoryBackend for ReadOnlyBackend {
        fn load(&self, session_id: &SessionKey) -> Result<Vec<Turn>, LoadError> {
            self.inner.load(session_id)
        }

        fn save(&self, session_id: &SessionKey, _turns: &[Turn]) -> HistoryResult<()> {
            Err(HistoryError::Persistence {
                path: self.inner.path_for(session_id),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    fn key(raw: &str) -> SessionKey {
        SessionKey::new(raw).unwrap_or_default()
    }

    fn service(dir: &std::path::Path, provider: Arc<ScriptedProvider>) -> ChatService {
        let config = HistoryConfig::with_chat_dir(dir);
        let registry = Arc::new(SessionRegistry::new(&config).unwrap());
        ChatService::new(registry, provider, config.inference_window)
    }

    #[test]
    fn test_respond_records_both_turns() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        let chat = service(dir.path(), provider.clone());

        let reply = chat.respond(&key("s1"), "Tell me about Puti fish").unwrap();
        assert_eq!(reply.response, "about: Tell me about Puti fish");
        assert!(reply.persisted);

        let history = chat.history(&key("s1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].role, TurnRole::Assistant);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].role, TurnRole::System);
    }

    #[test]
    fn test_provider_failure_keeps_user_turn() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        provider.failing.store(true, Ordering::SeqCst);
        let chat = service(dir.path(), provider.clone());

        let result = chat.respond(&key("s1"), "What about Mola?");
        assert!(matches!(result, Err(ChatError::Provider(_))));
        let history = chat.history(&key("s1"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, TurnRole::User);

        provider.failing.store(false, Ordering::SeqCst);
        let reply = chat.respond(&key("s1"), "What about Mola?").unwrap();
        assert_eq!(reply.response, "about: What about Mola?");
        assert_eq!(chat.history(&key("s1")).len(), 3);
    }

    #[test]
    fn test_window_sent_to_provider_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        let chat = service(dir.path(), provider.clone());

        for i in 0..12 {
            chat.respond(&key("s1"), &format!("question {i}")).unwrap();
        }

        let seen = provider.seen.lock().unwrap();
        let last = seen.last().cloned().unwrap_or_default();
        assert_eq!(last.len(), 11);
        assert_eq!(last[0].role, TurnRole::System);
        assert_eq!(last[10].content, "question 11");
        assert_eq!(chat.history(&key("s1")).len(), 15);
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        let chat = service(dir.path(), provider.clone());

        let result = chat.respond(&key("s1"), "  ");
        assert!(matches!(
            result,
            Err(ChatError::History(HistoryError::InvalidTurn(_)))
        ));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_persistence_failure_does_not_block_reply() {
        let dir = tempfile::tempdir().unwrap();
        let config = HistoryConfig::with_chat_dir(dir.path());
        let backend = Arc::new(ReadOnlyBackend {
            inner: JsonFileBackend::new(dir.path()).unwrap(),
        });
        let store = ConversationStore::with_backend(&config, backend).unwrap();
        let registry = Arc::new(SessionRegistry::with_store(store, None));
        let chat = ChatService::new(registry, Arc::new(ScriptedProvider::new()), 10);

        let reply = chat.respond(&key("s1"), "Is Tengra a small fish?").unwrap();
        assert!(!reply.persisted);
        assert_eq!(chat.history(&key("s1")).len(), 2);
    }

    #[test]
    fn test_clear_keeps_directive() {
        let dir = tempfile::tempdir().unwrap();
        let chat = service(dir.path(), Arc::new(ScriptedProvider::new()));
        chat.respond(&key("s1"), "hello").unwrap();
        chat.clear(&key("s1")).unwrap();
        assert!(chat.history(&key("s1")).is_empty());
        let window = chat
            .registry()
            .get_or_create(&key("s1"))
            .build_inference_window(10);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, chat.system_directive());
    }
}
