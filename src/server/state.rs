//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::assistant::client::AssistantClient;
use crate::assistant::llm::LlmAssistant;
use crate::core::config::AssistantConfig;
use crate::core::errors::AssistantResult;
use crate::llm::OllamaClient;

/// Shared application state.
pub struct AppState {
    /// Assistant answering every route.
    pub assistant: Arc<dyn AssistantClient>,
    /// Model name reported by the health check.
    pub model_name: String,
}

impl AppState {
    /// Build the Ollama-backed assistant from `config`.
    ///
    /// # Errors
    /// Returns an error if the Ollama client or the response parser cannot be created.
    pub fn new(config: &AssistantConfig) -> AssistantResult<Arc<Self>> {
        let ollama = OllamaClient::new(&config.llm)?;
        let assistant = LlmAssistant::new(ollama, &config.llm)?;
        Ok(Self::with_assistant(
            Arc::new(assistant),
            config.llm.model.clone(),
        ))
    }

    /// Serve an existing assistant.
    #[must_use]
    pub fn with_assistant(assistant: Arc<dyn AssistantClient>, model_name: String) -> Arc<Self> {
        Arc::new(Self {
            assistant,
            model_name,
        })
    }
}
