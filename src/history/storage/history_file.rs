//! JSON-file backend for per-session history records.
//!
//! One pretty-printed record per session:
//!
//! ```json
//! { "session_id": "s1", "last_updated": "2026-10-19T10:57:00Z",
//!   "messages": [ { "role": "system", "content": "...", "timestamp": "..." } ] }
//! ```
//!
//! Writes go to a sibling temp file which is flushed, synced and renamed over
//! the target, so a reader only ever sees the previous record or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::history::core::errors::{HistoryError, HistoryResult, LoadError};
use crate::history::core::ids::SessionKey;
use crate::history::core::turn::Turn;

/// Durable storage for whole conversation logs.
pub trait HistoryBackend: Send + Sync {
    /// Load the stored turns for a session.
    ///
    /// # Errors
    /// Returns [`LoadError::Missing`] if nothing is stored, or a read/parse error.
    fn load(&self, session_id: &SessionKey) -> Result<Vec<Turn>, LoadError>;

    /// Replace the stored turns for a session.
    ///
    /// # Errors
    /// Returns [`HistoryError::Persistence`] if the record could not be written.
    fn save(&self, session_id: &SessionKey, turns: &[Turn]) -> HistoryResult<()>;
}

/// Stored record as read back from disk.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    #[serde(default)]
    messages: Vec<Turn>,
}

/// Record shape used for writing, borrowing the live turns.
#[derive(Serialize)]
struct HistoryRecordRef<'a> {
    session_id: &'a str,
    last_updated: DateTime<Utc>,
    messages: &'a [Turn],
}

/// Directory of `chat_history_<session>.json` files.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> HistoryResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| HistoryError::Persistence {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `session_id`.
    #[must_use]
    pub fn path_for(&self, session_id: &SessionKey) -> PathBuf {
        self.dir.join(session_id.history_file_name())
    }
}

impl HistoryBackend for JsonFileBackend {
    fn load(&self, session_id: &SessionKey) -> Result<Vec<Turn>, LoadError> {
        let path = self.path_for(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(LoadError::Missing),
            Err(err) => return Err(LoadError::Io(err)),
        };
        let record: HistoryRecord = serde_json::from_str(&content)?;
        Ok(record.messages)
    }

    fn save(&self, session_id: &SessionKey, turns: &[Turn]) -> HistoryResult<()> {
        let record = HistoryRecordRef {
            session_id: session_id.as_str(),
            last_updated: Utc::now(),
            messages: turns,
        };
        let bytes = serde_json::to_vec_pretty(&record)?;
        let path = self.path_for(session_id);
        write_atomic(&path, &bytes).map_err(|source| HistoryError::Persistence {
            path: path.clone(),
            source,
        })?;
        debug!("Persisted {} turns to {}", turns.len(), path.display());
        Ok(())
    }
}

/// Temp file that is removed on drop unless it was renamed into place.
struct PendingWrite {
    tmp_path: PathBuf,
    committed: bool,
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    let mut pending = PendingWrite {
        tmp_path,
        committed: false,
    };

    let mut file = File::create(&pending.tmp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);

    fs::rename(&pending.tmp_path, path)?;
    pending.committed = true;
    Ok(())
}
