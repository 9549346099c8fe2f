//! Completion provider seam and its error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::core::turn::WindowMessage;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Errors produced by completion providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Invalid provider settings.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
    /// No API key configured.
    #[error("GROQ_API_KEY is not set")]
    MissingApiKey,
    /// Transport-level HTTP failure.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// Response did not contain a usable reply.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Check if retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpClient(err) => err.is_timeout() || err.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidConfig(_) | Self::MissingApiKey | Self::MalformedResponse(_) => false,
        }
    }
}

/// Sampling settings for chat completions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Completion model name.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Max tokens in the reply.
    pub max_tokens: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Bearer token; read from `GROQ_API_KEY` when loading from the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.3,
            max_tokens: 512,
            top_p: 0.9,
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or sampling values are out of range.
    pub fn validate(&self) -> Result<(), ProviderError> {
        url::Url::parse(&self.base_url)
            .map_err(|err| ProviderError::InvalidConfig(format!("llm.base_url: {err}")))?;

        if self.model.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidConfig(
                "llm.temperature must be within 0.0..=2.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) || self.top_p == 0.0 {
            return Err(ProviderError::InvalidConfig(
                "llm.top_p must be within (0.0, 1.0]".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidConfig(
                "llm.max_tokens must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Opaque request/response completion collaborator.
///
/// Given the inference window (system message first), returns the assistant
/// reply text.
pub trait CompletionProvider: Send + Sync {
    /// Request one assistant reply.
    ///
    /// # Errors
    /// Returns a [`ProviderError`] carrying the underlying cause.
    fn complete(&self, messages: &[WindowMessage]) -> Result<String, ProviderError>;

    /// Model name used for replies.
    fn model_name(&self) -> &str;
}
