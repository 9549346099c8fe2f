//! Blocking client for OpenAI-compatible chat completions (Groq by default).
//!
//! Behaviour:
//! - `POST {base_url}/chat/completions` with the inference window as `messages`.
//! - Non-streaming; the first choice's message content is the reply.
//! - Sampling settings come from [`LlmConfig`].
//!
//! The client is blocking like the rest of the history path; async callers
//! should run it on a blocking thread.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::core::turn::WindowMessage;
use crate::llm::completion::{CompletionProvider, LlmConfig, ProviderError};

/// HTTP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// HTTP client timeout for a whole completion.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest error body kept in [`ProviderError::HttpStatus`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WindowMessage],
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for Groq and other OpenAI-compatible endpoints.
pub struct GroqChat {
    client: Client,
    config: LlmConfig,
    endpoint: String,
    api_key: String,
}

impl GroqChat {
    /// Create a client from validated settings.
    ///
    /// # Errors
    /// Returns an error if the settings are invalid, no API key is configured,
    /// or the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CLIENT_TIMEOUT)
            .build()?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
            api_key,
        })
    }
}

impl CompletionProvider for GroqChat {
    fn complete(&self, messages: &[WindowMessage]) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            stream: false,
        };

        debug!(
            "Requesting completion from {} with {} messages",
            self.config.model,
            messages.len()
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json()?;
        extract_reply(parsed)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn extract_reply(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("no reply content".to_string()))
}
