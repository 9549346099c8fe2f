//! Durable storage for conversation logs.

pub mod history_file;

pub use history_file::{HistoryBackend, JsonFileBackend};
