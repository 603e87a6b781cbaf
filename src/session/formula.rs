//! Validate / explain / debug analyses over one shared formula field.
//!
//! The three analyses run on independent operation slots: starting one never
//! cancels or blocks another, and a failure in one leaves the others as they
//! were. Each request snapshots the formula when it begins, so a displayed
//! result always belongs to the formula that was current at submission time.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::assistant::client::AssistantClient;
use crate::core::errors::{RequestError, RequestResult};
use crate::session::analysis::{AnalysisKind, DebugResult, ExplanationResult, ValidationResult};
use crate::session::operation::{AsyncOperation, Commit, Generation, OperationStatus};

/// An analysis whose backend call has not been made yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    kind: AnalysisKind,
    generation: Generation,
    formula: String,
    error_message: Option<String>,
}

impl AnalysisRequest {
    /// Which analysis this is.
    #[must_use]
    pub const fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Generation on the analysis slot.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Formula snapshot sent to the backend.
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Error message snapshot, only ever set for debug requests.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Package a failure for [`FormulaAnalysisSession::settle`] without calling the backend.
    #[must_use]
    pub fn fail(&self, error: RequestError) -> AnalysisCompletion {
        AnalysisCompletion {
            generation: self.generation,
            outcome: AnalysisOutcome::failure(self.kind, error),
        }
    }

    /// Call the backend and package the answer for [`FormulaAnalysisSession::settle`].
    pub async fn execute(self, client: &dyn AssistantClient) -> AnalysisCompletion {
        let outcome = match self.kind {
            AnalysisKind::Validate => {
                AnalysisOutcome::Validation(client.validate_formula(&self.formula).await)
            }
            AnalysisKind::Explain => {
                AnalysisOutcome::Explanation(client.explain_formula(&self.formula).await)
            }
            AnalysisKind::Debug => AnalysisOutcome::Debug(
                client
                    .debug_formula(&self.formula, self.error_message.as_deref())
                    .await,
            ),
        };
        AnalysisCompletion {
            generation: self.generation,
            outcome,
        }
    }
}

/// Backend answer for one analysis kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Answer to a validate request.
    Validation(RequestResult<ValidationResult>),
    /// Answer to an explain request.
    Explanation(RequestResult<ExplanationResult>),
    /// Answer to a debug request.
    Debug(RequestResult<DebugResult>),
}

impl AnalysisOutcome {
    /// A failed answer for `kind`.
    #[must_use]
    pub fn failure(kind: AnalysisKind, error: RequestError) -> Self {
        match kind {
            AnalysisKind::Validate => Self::Validation(Err(error)),
            AnalysisKind::Explain => Self::Explanation(Err(error)),
            AnalysisKind::Debug => Self::Debug(Err(error)),
        }
    }

    /// Which slot this answer belongs to.
    #[must_use]
    pub const fn kind(&self) -> AnalysisKind {
        match self {
            Self::Validation(_) => AnalysisKind::Validate,
            Self::Explanation(_) => AnalysisKind::Explain,
            Self::Debug(_) => AnalysisKind::Debug,
        }
    }

    /// The failure, if the backend call failed.
    #[must_use]
    pub const fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Validation(Err(err)) | Self::Explanation(Err(err)) | Self::Debug(Err(err)) => {
                Some(err)
            }
            _ => None,
        }
    }
}

/// Backend answer to an [`AnalysisRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisCompletion {
    /// Generation of the request being answered.
    pub generation: Generation,
    /// The answer.
    pub outcome: AnalysisOutcome,
}

/// Formula input plus three independent analysis slots.
#[derive(Clone, Debug, Default)]
pub struct FormulaAnalysisSession {
    formula: String,
    error_message: Option<String>,
    validation: AsyncOperation<ValidationResult>,
    explanation: AsyncOperation<ExplanationResult>,
    debugging: AsyncOperation<DebugResult>,
    submitted: HashMap<AnalysisKind, String>,
}

impl FormulaAnalysisSession {
    /// Create a session with an empty formula.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current formula text.
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Replace the formula text. Does not affect requests already begun.
    pub fn set_formula(&mut self, formula: impl Into<String>) {
        self.formula = formula.into();
    }

    /// Optional error message used by debug requests.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Replace the optional error message. Passed to the backend unchanged.
    pub fn set_error_message(&mut self, message: Option<String>) {
        self.error_message = message;
    }

    /// Begin an analysis against the current formula.
    pub fn begin(&mut self, kind: AnalysisKind) -> AnalysisRequest {
        let generation = match kind {
            AnalysisKind::Validate => self.validation.begin(),
            AnalysisKind::Explain => self.explanation.begin(),
            AnalysisKind::Debug => self.debugging.begin(),
        };
        self.submitted.insert(kind, self.formula.clone());
        debug!(%kind, %generation, "analysis submitted");

        AnalysisRequest {
            kind,
            generation,
            formula: self.formula.clone(),
            error_message: match kind {
                AnalysisKind::Debug => self.error_message.clone(),
                AnalysisKind::Validate | AnalysisKind::Explain => None,
            },
        }
    }

    /// Fold a backend answer into its slot.
    pub fn settle(&mut self, completion: AnalysisCompletion) -> Commit {
        let AnalysisCompletion {
            generation,
            outcome,
        } = completion;
        let kind = outcome.kind();
        let reason = outcome.error().map(ToString::to_string);

        let commit = match outcome {
            AnalysisOutcome::Validation(result) => self.validation.settle(generation, result),
            AnalysisOutcome::Explanation(result) => self.explanation.settle(generation, result),
            AnalysisOutcome::Debug(result) => self.debugging.settle(generation, result),
        };
        if let (Some(reason), Commit::Committed) = (reason, commit) {
            warn!(%kind, %generation, error = %reason, "analysis failed");
        }
        commit
    }

    /// Run one analysis to completion.
    pub async fn run(&mut self, client: &dyn AssistantClient, kind: AnalysisKind) -> Commit {
        let request = self.begin(kind);
        let completion = request.execute(client).await;
        self.settle(completion)
    }

    /// Validate the current formula.
    pub async fn validate(&mut self, client: &dyn AssistantClient) -> Commit {
        self.run(client, AnalysisKind::Validate).await
    }

    /// Explain the current formula.
    pub async fn explain(&mut self, client: &dyn AssistantClient) -> Commit {
        self.run(client, AnalysisKind::Explain).await
    }

    /// Debug the current formula with the current error message.
    pub async fn debug(&mut self, client: &dyn AssistantClient) -> Commit {
        self.run(client, AnalysisKind::Debug).await
    }

    /// Validate slot.
    #[must_use]
    pub const fn validation(&self) -> &AsyncOperation<ValidationResult> {
        &self.validation
    }

    /// Explain slot.
    #[must_use]
    pub const fn explanation(&self) -> &AsyncOperation<ExplanationResult> {
        &self.explanation
    }

    /// Debug slot.
    #[must_use]
    pub const fn debugging(&self) -> &AsyncOperation<DebugResult> {
        &self.debugging
    }

    /// Status of one slot.
    #[must_use]
    pub const fn status(&self, kind: AnalysisKind) -> OperationStatus {
        match kind {
            AnalysisKind::Validate => self.validation.status(),
            AnalysisKind::Explain => self.explanation.status(),
            AnalysisKind::Debug => self.debugging.status(),
        }
    }

    /// Error of one slot, when its latest request failed.
    #[must_use]
    pub const fn error(&self, kind: AnalysisKind) -> Option<&RequestError> {
        match kind {
            AnalysisKind::Validate => self.validation.error(),
            AnalysisKind::Explain => self.explanation.error(),
            AnalysisKind::Debug => self.debugging.error(),
        }
    }

    /// User-facing failure text for one slot, when its latest request failed.
    #[must_use]
    pub const fn failure_notice(&self, kind: AnalysisKind) -> Option<&'static str> {
        match self.error(kind) {
            Some(_) => Some(kind.failure_notice()),
            None => None,
        }
    }

    /// True when any slot is waiting for an answer.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.validation.is_pending() || self.explanation.is_pending() || self.debugging.is_pending()
    }

    /// Formula the latest request of `kind` was made with.
    #[must_use]
    pub fn submitted_formula(&self, kind: AnalysisKind) -> Option<&str> {
        self.submitted.get(&kind).map(String::as_str)
    }

    /// True when the formula field has changed since `kind` was last requested.
    #[must_use]
    pub fn is_stale(&self, kind: AnalysisKind) -> bool {
        self.submitted
            .get(&kind)
            .is_some_and(|submitted| *submitted != self.formula)
    }
}
