//! Session identifiers.
//!
//! Session ids arrive from clients as free-form strings and are also used to
//! derive the history file name, so they are validated once at the boundary
//! and carried around as [`SessionKey`] afterwards.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Session id used when a client does not send one.
pub const DEFAULT_SESSION: &str = "default";

/// Errors returned when parsing/validating a [`SessionKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    /// Empty identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a disallowed character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
    /// Starts with a dot (hidden or relative file names).
    LeadingDot,
}

impl fmt::Display for SessionKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "session id must not be empty"),
            Self::TooLong { max, got } => write!(f, "session id too long: got {got}, max {max}"),
            Self::InvalidChar { ch, index } => {
                write!(
                    f,
                    "session id contains invalid character {ch:?} at index {index}"
                )
            }
            Self::LeadingDot => write!(f, "session id must not start with '.'"),
        }
    }
}

impl std::error::Error for SessionKeyError {}

/// Identifier for one conversation session.
///
/// Examples:
/// - `default`
/// - `fish_expert`
/// - `3f1c2a9e-7b4d-4d8e-9a61-0c2f5e8b7d10`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Hard ceiling to keep derived file names portable.
    pub const MAX_LEN: usize = 128;

    /// Build a validated `SessionKey`.
    ///
    /// Rules:
    /// - Non-empty.
    /// - Max length limited.
    /// - Conservative ASCII set: `[A-Za-z0-9._-]`, no leading `.`.
    ///
    /// # Errors
    /// Returns `SessionKeyError` if the input is empty, too long, or contains invalid characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SessionKeyError> {
        let s = raw.as_ref();

        if s.is_empty() {
            return Err(SessionKeyError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(SessionKeyError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        if s.starts_with('.') {
            return Err(SessionKeyError::LeadingDot);
        }

        for (i, ch) in s.chars().enumerate() {
            let ok = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-');
            if !ok {
                return Err(SessionKeyError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// The key used when a client omits its session id.
    #[must_use]
    pub fn default_session() -> Self {
        Self(DEFAULT_SESSION.to_owned())
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into `String`.
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// File name of this session's durable record.
    #[must_use]
    pub fn history_file_name(&self) -> String {
        format!("chat_history_{}.json", self.0)
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::default_session()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKey {
    type Err = SessionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<SessionKey> for String {
    fn from(value: SessionKey) -> Self {
        value.into_string()
    }
}

impl TryFrom<String> for SessionKey {
    type Error = SessionKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
