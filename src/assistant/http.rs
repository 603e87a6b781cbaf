//! [`AssistantClient`] over the backend REST API.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::assistant::client::{AssistantClient, ClientFuture};
use crate::core::config::BackendConfig;
use crate::core::errors::{AssistantResult, RequestError, RequestResult};
use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

#[derive(Serialize)]
struct QueryBody {
    query: String,
}

#[derive(Serialize)]
struct FormulaBody {
    formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct QueryReply {
    response: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// Talks to `{base_url}/excel-assistant/...`.
#[derive(Clone, Debug)]
pub struct HttpAssistantClient {
    client: Client,
    base_url: String,
}

impl HttpAssistantClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> AssistantResult<Self> {
        Url::parse(&config.base_url)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Backend base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/excel-assistant/{action}/", self.base_url)
    }

    async fn post<B, T>(&self, action: &str, body: B) -> RequestResult<T>
    where
        B: Serialize + Send,
        T: DeserializeOwned,
    {
        let url = self.endpoint(action);
        debug!(%url, "posting to backend");
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorReply>(&bytes).map_or_else(
                |_| String::from_utf8_lossy(&bytes).into_owned(),
                |reply| reply.error,
            );
            return Err(RequestError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl AssistantClient for HttpAssistantClient {
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>> {
        let body = QueryBody {
            query: text.to_string(),
        };
        Box::pin(async move {
            let reply: QueryReply = self.post("query", body).await?;
            Ok(reply.response)
        })
    }

    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>> {
        let body = FormulaBody {
            formula: formula.to_string(),
            error_message: None,
        };
        Box::pin(self.post("validate_formula", body))
    }

    fn explain_formula(
        &self,
        formula: &str,
    ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
        let body = FormulaBody {
            formula: formula.to_string(),
            error_message: None,
        };
        Box::pin(self.post("explain_formula", body))
    }

    fn debug_formula(
        &self,
        formula: &str,
        error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>> {
        let body = FormulaBody {
            formula: formula.to_string(),
            error_message: error_message.map(str::to_string),
        };
        Box::pin(self.post("debug_formula", body))
    }
}
