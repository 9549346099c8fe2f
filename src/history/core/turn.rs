//! Turn model for conversation logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Pinned system directive.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

impl TurnRole {
    /// Stable string form for storage and the completion API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Whether this role is part of the conversation proper.
    #[must_use]
    pub const fn is_conversation(self) -> bool {
        !matches!(self, Self::System)
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// One message in a conversation log.
///
/// Ordering is positional; `created_at` is advisory metadata only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the turn.
    pub role: TurnRole,
    /// Message text.
    pub content: String,
    /// When the turn was appended.
    #[serde(rename = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a turn stamped with the current time.
    #[must_use]
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Build the system turn holding `directive`.
    #[must_use]
    pub fn system(directive: impl Into<String>) -> Self {
        Self::new(TurnRole::System, directive)
    }

    /// Project to the timestamp-free form sent to the completion provider.
    #[must_use]
    pub fn to_message(&self) -> WindowMessage {
        WindowMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `{role, content}` pair as submitted for inference.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    /// Role of the message.
    pub role: TurnRole,
    /// Message text.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_as_lowercase() {
        assert_eq!(TurnRole::from_str("assistant"), Ok(TurnRole::Assistant));
        assert_eq!(TurnRole::User.to_string(), "user");
        assert!(TurnRole::from_str("tool").is_err());
    }

    #[test]
    fn test_turn_serializes_timestamp_field() {
        let turn = Turn::new(TurnRole::User, "What is Puti?");
        let value = serde_json::to_value(&turn).unwrap_or_default();
        assert_eq!(value["role"], "user");
        assert!(value.get("timestamp").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_window_message_has_no_timestamp() {
        let message = Turn::system("directive").to_message();
        let value = serde_json::to_value(&message).unwrap_or_default();
        assert_eq!(value["role"], "system");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn test_missing_timestamp_is_tolerated() {
        let turn: Result<Turn, _> =
            serde_json::from_str(r#"{"role":"assistant","content":"Mola is a small fish."}"#);
        assert!(turn.is_ok());
    }
}
