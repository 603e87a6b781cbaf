//! Assistant backed directly by a text-generation model.

use crate::assistant::client::{AssistantClient, ClientFuture};
use crate::assistant::prompts::{self, ResponseParser};
use crate::core::config::{GenerationConfig, LlmConfig};
use crate::core::errors::{AssistantResult, RequestError, RequestResult};
use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

/// Produces text from a prompt.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    /// Returns a `RequestError` if the model cannot be reached or fails.
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> ClientFuture<'_, RequestResult<String>>;
}

/// [`AssistantClient`] that prompts a [`TextGenerator`] and parses its output.
#[derive(Debug)]
pub struct LlmAssistant<G> {
    generator: G,
    query: GenerationConfig,
    analysis: GenerationConfig,
    parser: ResponseParser,
}

impl<G: TextGenerator> LlmAssistant<G> {
    /// Wrap `generator` with the sampling profiles from `config`.
    ///
    /// # Errors
    /// Returns an error if the response parser cannot be built.
    pub fn new(generator: G, config: &LlmConfig) -> AssistantResult<Self> {
        Ok(Self {
            generator,
            query: config.query.clone(),
            analysis: config.analysis.clone(),
            parser: ResponseParser::new()?,
        })
    }

    /// The underlying generator.
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    async fn analyse(&self, prompt: String) -> RequestResult<String> {
        self.generator.generate(&prompt, &self.analysis).await
    }
}

impl<G: TextGenerator> AssistantClient for LlmAssistant<G> {
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>> {
        let prompt = prompts::query_prompt(text);
        Box::pin(async move {
            let answer = self.generator.generate(&prompt, &self.query).await?;
            if answer.trim().is_empty() {
                return Err(RequestError::Backend("model returned an empty answer".to_string()));
            }
            Ok(answer)
        })
    }

    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>> {
        let prompt = prompts::validation_prompt(formula);
        Box::pin(async move {
            let text = self.analyse(prompt).await?;
            Ok(self.parser.validation(&text))
        })
    }

    fn explain_formula(
        &self,
        formula: &str,
    ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
        let prompt = prompts::explanation_prompt(formula);
        Box::pin(async move {
            let text = self.analyse(prompt).await?;
            Ok(self.parser.explanation(&text))
        })
    }

    fn debug_formula(
        &self,
        formula: &str,
        error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>> {
        let prompt = prompts::debug_prompt(formula, error_message);
        Box::pin(async move {
            let text = self.analyse(prompt).await?;
            Ok(self.parser.debug(&text))
        })
    }
}
