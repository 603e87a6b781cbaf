//! Backend doubles and log capture shared by the unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::assistant::client::{AssistantClient, ClientFuture};
use crate::core::errors::{RequestError, RequestResult};
use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

/// A call observed by a test client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Query(String),
    Validate(String),
    Explain(String),
    Debug(String, Option<String>),
}

/// Answers every call immediately with a fixed outcome.
pub(crate) struct ScriptedClient {
    pub answer: RequestResult<String>,
    pub validation: RequestResult<ValidationResult>,
    pub explanation: RequestResult<ExplanationResult>,
    pub debug: RequestResult<DebugResult>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            validation: Ok(ValidationResult::default()),
            explanation: Ok(ExplanationResult::default()),
            debug: Ok(DebugResult::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: &RequestError) -> Self {
        Self {
            answer: Err(error.clone()),
            validation: Err(error.clone()),
            explanation: Err(error.clone()),
            debug: Err(error.clone()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AssistantClient for ScriptedClient {
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>> {
        self.record(Call::Query(text.to_string()));
        Box::pin(async move { self.answer.clone() })
    }

    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>> {
        self.record(Call::Validate(formula.to_string()));
        Box::pin(async move { self.validation.clone() })
    }

    fn explain_formula(
        &self,
        formula: &str,
    ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
        self.record(Call::Explain(formula.to_string()));
        Box::pin(async move { self.explanation.clone() })
    }

    fn debug_formula(
        &self,
        formula: &str,
        error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>> {
        self.record(Call::Debug(
            formula.to_string(),
            error_message.map(str::to_string),
        ));
        Box::pin(async move { self.debug.clone() })
    }
}

/// Holds query and validation answers until the test releases them.
///
/// Gates must be opened before the matching call is made. Explain and debug
/// calls answer immediately with empty results.
#[derive(Default)]
pub(crate) struct GatedClient {
    queries: Mutex<HashMap<String, oneshot::Receiver<RequestResult<String>>>>,
    validations: Mutex<HashMap<String, oneshot::Receiver<RequestResult<ValidationResult>>>>,
}

impl GatedClient {
    pub(crate) fn gate_query(&self, text: &str) -> oneshot::Sender<RequestResult<String>> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut gates) = self.queries.lock() {
            gates.insert(text.to_string(), rx);
        }
        tx
    }

    pub(crate) fn gate_validation(
        &self,
        formula: &str,
    ) -> oneshot::Sender<RequestResult<ValidationResult>> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut gates) = self.validations.lock() {
            gates.insert(formula.to_string(), rx);
        }
        tx
    }
}

fn closed_gate() -> RequestError {
    RequestError::Unreachable("gate closed".to_string())
}

impl AssistantClient for GatedClient {
    fn query(&self, text: &str) -> ClientFuture<'_, RequestResult<String>> {
        let gate = self.queries.lock().ok().and_then(|mut g| g.remove(text));
        Box::pin(async move {
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(closed_gate())),
                None => Err(closed_gate()),
            }
        })
    }

    fn validate_formula(&self, formula: &str) -> ClientFuture<'_, RequestResult<ValidationResult>> {
        let gate = self.validations.lock().ok().and_then(|mut g| g.remove(formula));
        Box::pin(async move {
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(closed_gate())),
                None => Err(closed_gate()),
            }
        })
    }

    fn explain_formula(
        &self,
        _formula: &str,
    ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
        Box::pin(async { Ok(ExplanationResult::default()) })
    }

    fn debug_formula(
        &self,
        _formula: &str,
        _error_message: Option<&str>,
    ) -> ClientFuture<'_, RequestResult<DebugResult>> {
        Box::pin(async { Ok(DebugResult::default()) })
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a debug-level subscriber scoped to this thread and return
/// everything it logged.
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
