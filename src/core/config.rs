//! Configuration for the assistant client, LLM backend and server.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{AssistantError, AssistantResult};

/// Environment variable overriding the backend base URL used by clients.
pub const BACKEND_URL_ENV: &str = "SHEETMATE_BACKEND_URL";
/// Environment variable overriding the Ollama base URL.
pub const OLLAMA_URL_ENV: &str = "SHEETMATE_OLLAMA_URL";
/// Environment variable overriding the completion model name.
pub const MODEL_ENV: &str = "SHEETMATE_MODEL";
/// Environment variable overriding the server port.
pub const PORT_ENV: &str = "SHEETMATE_PORT";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Where the HTTP client sends its requests.
    pub backend: BackendConfig,
    /// Completion model settings used when serving the backend contract.
    pub llm: LlmConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Conversation thread behaviour.
    pub conversation: ConversationConfig,
}

impl AssistantConfig {
    /// Build the default configuration and apply environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the default configuration and apply overrides from `lookup`.
    ///
    /// Unparsable port values are ignored.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(BACKEND_URL_ENV) {
            config.backend.base_url = url;
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV) {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup(MODEL_ENV) {
            config.llm.model = model;
        }
        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> AssistantResult<()> {
        Url::parse(&self.backend.base_url)?;
        Url::parse(&self.llm.base_url)?;

        if self.backend.request_timeout_secs == 0 {
            return Err(AssistantError::InvalidConfig(
                "backend.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.backend.connect_timeout_secs == 0 {
            return Err(AssistantError::InvalidConfig(
                "backend.connect_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(AssistantError::InvalidConfig(
                "llm.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(AssistantError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }

        self.llm.query.validate("llm.query")?;
        self.llm.analysis.validate("llm.analysis")?;

        if self.conversation.fallback_message.trim().is_empty() {
            return Err(AssistantError::InvalidConfig(
                "conversation.fallback_message must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Backend endpoint settings for the HTTP client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL the `/excel-assistant/...` routes hang off.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/api".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 5,
        }
    }
}

/// Sampling parameters for one kind of generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum number of generated tokens.
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    fn validate(&self, section: &str) -> AssistantResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AssistantError::InvalidConfig(format!(
                "{section}.temperature must be within [0, 2]"
            )));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(AssistantError::InvalidConfig(format!(
                "{section}.top_p must be within (0, 1]"
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(AssistantError::InvalidConfig(format!(
                "{section}.max_output_tokens must be > 0"
            )));
        }
        Ok(())
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL.
    pub base_url: String,
    /// Ollama completion model name.
    pub model: String,
    /// How long Ollama keeps the model resident after a call.
    pub keep_alive: String,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Free-text query sampling.
    pub query: GenerationConfig,
    /// Formula analysis sampling. Lower temperature keeps the JSON stable.
    pub analysis: GenerationConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            keep_alive: "1h".to_string(),
            request_timeout_secs: 120,
            query: GenerationConfig {
                temperature: 0.7,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
            },
            analysis: GenerationConfig {
                temperature: 0.3,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Conversation thread behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Assistant message appended when a query fails.
    pub fallback_message: String,
    /// Banner text recorded when a query fails and no backend message is available.
    pub failure_banner: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            fallback_message: "I apologize, but I encountered an error processing your query. Please try again.".to_string(),
            failure_banner: "Failed to process query".to_string(),
        }
    }
}
