//! Application configuration assembled from defaults and the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::core::config::HistoryConfig;
use crate::history::core::errors::HistoryError;
use crate::llm::completion::{API_KEY_ENV, LlmConfig, ProviderError};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Environment variable overriding the HTTP port.
pub const PORT_ENV: &str = "FISHCHAT_PORT";
/// Environment variable overriding the history directory.
pub const CHAT_DIR_ENV: &str = "FISHCHAT_CHAT_DIR";
/// Environment variable overriding the completion model.
pub const MODEL_ENV: &str = "FISHCHAT_MODEL";
/// Environment variable overriding the provider base URL.
pub const PROVIDER_URL_ENV: &str = "FISHCHAT_PROVIDER_URL";

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
    /// History settings are invalid.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// Provider settings are invalid.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Top-level settings for the chat server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Conversation history settings.
    pub history: HistoryConfig,
    /// Completion provider settings.
    pub llm: LlmConfig,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            llm: LlmConfig::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is malformed or the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values.
    ///
    /// # Errors
    /// Returns an error if a variable is malformed or the result fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(PORT_ENV) {
            config.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV,
                value: raw.clone(),
            })?;
        }
        if let Some(dir) = lookup(CHAT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.history.chat_dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            config.llm.model = model;
        }
        if let Some(url) = lookup(PROVIDER_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.llm.base_url = url;
        }
        config.llm.api_key = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.history.validate()?;
        self.llm.validate()?;
        Ok(())
    }
}
