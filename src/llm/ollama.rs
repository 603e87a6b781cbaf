//! Async Ollama client for `POST /api/generate`.
//!
//! Behaviour:
//! - Readiness is probed with `GET /api/version`.
//! - Every generation is non-streaming and carries its own sampling options,
//!   so one resident model serves both chat and formula analysis.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use url::Url;

use crate::assistant::client::ClientFuture;
use crate::assistant::llm::TextGenerator;
use crate::core::config::{GenerationConfig, LlmConfig};
use crate::core::errors::{AssistantResult, RequestError, RequestResult};

/// Context length requested for every generation (tokens).
const CONTEXT_LENGTH: u32 = 8_192;

/// Connect timeout for the Ollama API.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for Ollama to come up.
const READY_RETRY: Duration = Duration::from_millis(250);

/// Default thread count if `available_parallelism()` is unavailable.
const DEFAULT_NUM_THREAD: u32 = 8;

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    num_predict: u32,
    num_thread: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
}

impl GenerateOptions {
    fn from_config(config: &GenerationConfig) -> Self {
        Self {
            num_ctx: CONTEXT_LENGTH,
            num_predict: config.max_output_tokens,
            num_thread: detect_num_thread(),
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    keep_alive: &'a str,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Ollama HTTP client bound to one model.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    keep_alive: String,
}

impl OllamaClient {
    /// Create a client from the LLM section of the configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> AssistantResult<Self> {
        Url::parse(&config.base_url)?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
        })
    }

    /// Model name sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check whether the Ollama API answers.
    pub async fn is_ready(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(%err, "ollama not ready");
                false
            }
        }
    }

    /// Poll [`Self::is_ready`] until it succeeds or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready().await {
                info!(model = %self.model, "ollama is ready");
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(READY_RETRY).await;
        }
    }

    async fn post_generate(&self, request: GenerateRequest<'_>) -> RequestResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |err| err.error);
            return Err(RequestError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateResponse>().await?;
        body.response
            .ok_or_else(|| RequestError::Malformed("missing `response` field".to_string()))
    }
}

impl TextGenerator for OllamaClient {
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> ClientFuture<'_, RequestResult<String>> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: prompt.to_string(),
            stream: false,
            keep_alive: &self.keep_alive,
            options: GenerateOptions::from_config(config),
        };
        Box::pin(self.post_generate(request))
    }
}

fn detect_num_thread() -> u32 {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .map_or(DEFAULT_NUM_THREAD, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    async fn serve_stub(router: Router) -> Option<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Some(format!("http://{addr}"))
    }

    fn client_for(base_url: String) -> Option<OllamaClient> {
        let config = LlmConfig {
            base_url,
            model: "test-model".to_string(),
            ..LlmConfig::default()
        };
        OllamaClient::new(&config).ok()
    }

    #[tokio::test]
    async fn test_generate_sends_sampling_options() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                let echo = format!(
                    "{}|{}|{}|{}",
                    body["model"],
                    body["stream"],
                    body["options"]["num_predict"],
                    body["options"]["top_k"]
                );
                Json(json!({ "response": echo, "done": true }))
            }),
        );
        let Some(base) = serve_stub(router).await else { return };
        let Some(client) = client_for(base) else { return };

        let config = LlmConfig::default().analysis;
        let text = client.generate("hello", &config).await;
        assert_eq!(text, Ok("\"test-model\"|false|1024|40".to_string()));
    }

    #[tokio::test]
    async fn test_error_status_carries_ollama_message() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "model 'test-model' not found" })),
                )
            }),
        );
        let Some(base) = serve_stub(router).await else { return };
        let Some(client) = client_for(base) else { return };

        let result = client.generate("hello", &GenerationConfig {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 16,
        });
        assert_eq!(
            result.await,
            Err(RequestError::Status {
                status: 404,
                message: "model 'test-model' not found".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_response_field_is_malformed() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({ "done": true })) }),
        );
        let Some(base) = serve_stub(router).await else { return };
        let Some(client) = client_for(base) else { return };

        let result = client.generate("hello", &LlmConfig::default().query).await;
        assert!(matches!(result, Err(RequestError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_readiness_probe() {
        let router = Router::new().route(
            "/api/version",
            get(|| async { Json(json!({ "version": "0.5.0" })) }),
        );
        let Some(base) = serve_stub(router).await else { return };
        let Some(client) = client_for(base) else { return };
        assert!(client.is_ready().await);
        assert!(client.wait_until_ready(Duration::from_millis(10)).await);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = LlmConfig {
            base_url: "not a url".to_string(),
            ..LlmConfig::default()
        };
        assert!(OllamaClient::new(&config).is_err());
    }

    #[test]
    fn test_detect_num_thread_is_positive() {
        assert!(detect_num_thread() > 0);
    }
}
