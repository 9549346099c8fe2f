//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::history::session::registry::SessionRegistry;
use crate::llm::completion::CompletionProvider;
use crate::llm::groq_chat::GroqChat;

/// Shared application state.
pub struct AppState {
    /// Chat orchestration over the session registry.
    pub chat: ChatService,
}

impl AppState {
    /// Create the application state with the Groq provider.
    ///
    /// Builds a blocking HTTP client, so call this outside the async runtime.
    ///
    /// # Errors
    /// Returns an error if the history directory or provider client cannot be created.
    pub fn new(config: &AppConfig) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let provider = GroqChat::new(config.llm.clone())
            .map_err(|e| format!("Failed to create completion client: {e}"))?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Create the application state around an existing provider.
    ///
    /// # Errors
    /// Returns an error if the history directory cannot be created.
    pub fn with_provider(
        config: &AppConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let registry = SessionRegistry::new(&config.history)
            .map_err(|e| format!("Failed to open chat history: {e}"))?;
        let chat = ChatService::new(
            Arc::new(registry),
            provider,
            config.history.inference_window,
        );

        Ok(Arc::new(Self { chat }))
    }
}
