//! Core history types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod turn;

pub use config::{
    DEFAULT_INFERENCE_WINDOW, DEFAULT_RETENTION_LIMIT, DEFAULT_SYSTEM_DIRECTIVE, HistoryConfig,
};
pub use errors::{HistoryError, HistoryResult, LoadError};
pub use ids::{DEFAULT_SESSION, SessionKey, SessionKeyError};
pub use turn::{Turn, TurnRole, WindowMessage};
