//! Registry mapping session ids to their live conversation logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::history::core::config::HistoryConfig;
use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::SessionKey;
use crate::history::core::turn::{Turn, TurnRole, WindowMessage};
use crate::history::session::conversation_log::{ConversationLog, ConversationStore};

/// Shared, mutex-guarded handle to one session's log.
///
/// Every operation takes the session lock, so appends, resets and window
/// reads on the same session never interleave.
#[derive(Debug)]
pub struct SessionHandle {
    log: Mutex<ConversationLog>,
}

impl SessionHandle {
    const fn new(log: ConversationLog) -> Self {
        Self {
            log: Mutex::new(log),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConversationLog> {
        // The log is only mutated through methods that keep it consistent,
        // so a panic elsewhere while holding the lock leaves usable state.
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the log.
    pub fn with_log<R>(&self, f: impl FnOnce(&mut ConversationLog) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Session id of the wrapped log.
    #[must_use]
    pub fn session_id(&self) -> SessionKey {
        self.lock().session_id().clone()
    }

    /// Append a turn; see [`ConversationLog::append`].
    ///
    /// # Errors
    /// Returns an error if the turn is invalid or could not be persisted.
    pub fn append(&self, role: TurnRole, content: impl Into<String>) -> HistoryResult<()> {
        self.lock().append(role, content)
    }

    /// Build the inference window; see [`ConversationLog::build_inference_window`].
    #[must_use]
    pub fn build_inference_window(&self, max_conversation_turns: usize) -> Vec<WindowMessage> {
        self.lock().build_inference_window(max_conversation_turns)
    }

    /// Conversation turns for display; see [`ConversationLog::display_history`].
    #[must_use]
    pub fn display_history(&self) -> Vec<Turn> {
        self.lock().display_history()
    }

    /// Reset to the system turn; see [`ConversationLog::reset`].
    ///
    /// # Errors
    /// Returns an error if the reset log could not be persisted.
    pub fn reset(&self) -> HistoryResult<()> {
        self.lock().reset()
    }
}

/// Map entry for one id. Inserted empty under the shard lock; the log is
/// loaded into `handle` afterwards, outside any map lock.
struct SessionSlot {
    handle: OnceLock<Arc<SessionHandle>>,
    last_access: AtomicU64,
}

impl SessionSlot {
    const fn new(tick: u64) -> Self {
        Self {
            handle: OnceLock::new(),
            last_access: AtomicU64::new(tick),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_access.fetch_max(tick, Ordering::Relaxed);
    }
}

/// No caller holds the slot or its handle.
fn is_idle(slot: &Arc<SessionSlot>) -> bool {
    Arc::strong_count(slot) == 1
        && slot
            .handle
            .get()
            .is_none_or(|handle| Arc::strong_count(handle) == 1)
}

/// Lazily populated map from session id to its single live log.
///
/// Constructed once at startup and shared with request handlers.
pub struct SessionRegistry {
    store: ConversationStore,
    sessions: DashMap<SessionKey, Arc<SessionSlot>>,
    max_sessions: Option<usize>,
    clock: AtomicU64,
}

impl SessionRegistry {
    /// Create a registry backed by JSON files under `config.chat_dir`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the directory cannot be created.
    pub fn new(config: &HistoryConfig) -> HistoryResult<Self> {
        let store = ConversationStore::new(config)?;
        Ok(Self::with_store(store, config.max_sessions))
    }

    /// Create a registry on top of an existing store.
    #[must_use]
    pub fn with_store(store: ConversationStore, max_sessions: Option<usize>) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            max_sessions,
            clock: AtomicU64::new(0),
        }
    }

    /// Store used to load and persist logs.
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Return the live log for `session_id`, loading it on first access.
    ///
    /// Concurrent first accesses to the same id construct exactly one log.
    /// The load runs outside the map lock, so it never delays other ids.
    #[must_use]
    pub fn get_or_create(&self, session_id: &SessionKey) -> Arc<SessionHandle> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let (slot, created) = self.slot(session_id, tick);
        slot.touch(tick);

        let handle = Arc::clone(slot.handle.get_or_init(|| {
            Arc::new(SessionHandle::new(self.store.load(session_id.clone())))
        }));
        drop(slot);

        if created {
            info!("Registered session {session_id}");
            self.enforce_max_sessions(session_id);
        }

        handle
    }

    fn slot(&self, session_id: &SessionKey, tick: u64) -> (Arc<SessionSlot>, bool) {
        if let Some(existing) = self.sessions.get(session_id) {
            return (Arc::clone(existing.value()), false);
        }

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(SessionSlot::new(tick));
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    /// Whether a live log exists for `session_id`.
    #[must_use]
    pub fn contains(&self, session_id: &SessionKey) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session has been accessed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop least recently used idle sessions beyond `max_sessions`.
    ///
    /// Sessions still held by a caller are skipped, so a session never has
    /// two live logs. Dropped sessions reload from disk on next access.
    fn enforce_max_sessions(&self, keep: &SessionKey) {
        let Some(max) = self.max_sessions else {
            return;
        };

        while self.sessions.len() > max {
            let candidate = self
                .sessions
                .iter()
                .filter(|entry| entry.key() != keep && is_idle(entry.value()))
                .min_by_key(|entry| entry.value().last_access.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            let Some(key) = candidate else {
                return;
            };

            if self
                .sessions
                .remove_if(&key, |_, slot| is_idle(slot))
                .is_some()
            {
                debug!("Evicted idle session {key} from registry");
            }
        }
    }
}
