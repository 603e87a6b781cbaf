//! Backend capability consumed by the session layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::errors::RequestResult;
use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

/// Boxed future type for assistant calls.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The only source of real computation behind a session.
///
/// Calls are side-effect free from the session's point of view, so they may
/// be retried freely, and completions may arrive in any order.
pub trait AssistantClient: Send + Sync {
    /// Answer a free-text spreadsheet question.
    ///
    /// # Errors
    /// Returns a `RequestError` if the backend is unreachable or fails.
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>>;

    /// Validate a formula.
    ///
    /// # Errors
    /// Returns a `RequestError` if the backend is unreachable or fails.
    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>>;

    /// Explain a formula.
    ///
    /// # Errors
    /// Returns a `RequestError` if the backend is unreachable or fails.
    fn explain_formula(&self, formula: &str)
    -> ClientFuture<'_, RequestResult<ExplanationResult>>;

    /// Debug a formula, optionally given the error it produced.
    ///
    /// # Errors
    /// Returns a `RequestError` if the backend is unreachable or fails.
    fn debug_formula(
        &self,
        formula: &str,
        error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>>;
}

impl<C: AssistantClient + ?Sized> AssistantClient for Arc<C> {
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>> {
        (**self).query(text)
    }

    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>> {
        (**self).validate_formula(formula)
    }

    fn explain_formula(
        &self,
        formula: &str,
    ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
        (**self).explain_formula(formula)
    }

    fn debug_formula(
        &self,
        formula: &str,
        error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>> {
        (**self).debug_formula(formula, error_message)
    }
}
