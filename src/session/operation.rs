//! Generation-tagged state machine for one logical request slot.
//!
//! Each call to [`AsyncOperation::begin`] hands out a fresh [`Generation`].
//! Only the completion carrying the current generation may settle the slot;
//! anything older is a stale response and is dropped without touching state.
//! There is no real cancellation of in-flight calls: discarding late results
//! is the cancellation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::RequestError;

/// Monotonically increasing token identifying one request on a slot.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable lifecycle status of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Nothing requested yet, or reset.
    Idle,
    /// A request is in flight.
    Pending,
    /// The latest request succeeded.
    Succeeded,
    /// The latest request failed.
    Failed,
}

impl OperationStatus {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a completion was applied to its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// The completion belonged to the current request and settled it.
    Committed,
    /// The completion was stale (or the slot was not pending) and was dropped.
    Stale,
}

impl Commit {
    /// True when the completion settled the slot.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed)
    }
}

// Payloads live inside the variants so a value or error can only exist in
// the matching status.
#[derive(Clone, Debug)]
enum Slot<T> {
    Idle,
    Pending,
    Succeeded(T),
    Failed(RequestError),
}

/// One request slot with stale-result suppression.
#[derive(Clone, Debug)]
pub struct AsyncOperation<T> {
    generation: Generation,
    slot: Slot<T>,
}

impl<T> Default for AsyncOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncOperation<T> {
    /// Create an idle operation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: Generation(0),
            slot: Slot::Idle,
        }
    }

    /// Start a new request, superseding any request still in flight.
    ///
    /// Legal from every state. Clears any previous value or error.
    pub fn begin(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.slot = Slot::Pending;
        debug!(generation = %self.generation, "operation pending");
        self.generation
    }

    /// Settle the current request with a value.
    ///
    /// A no-op returning [`Commit::Stale`] unless `generation` is current and
    /// the operation is pending.
    pub fn resolve(&mut self, generation: Generation, value: T) -> Commit {
        if !self.accepts(generation) {
            debug!(%generation, current = %self.generation, "discarding stale success");
            return Commit::Stale;
        }
        self.slot = Slot::Succeeded(value);
        Commit::Committed
    }

    /// Settle the current request with an error. Symmetric to [`Self::resolve`].
    pub fn reject(&mut self, generation: Generation, error: RequestError) -> Commit {
        if !self.accepts(generation) {
            debug!(%generation, current = %self.generation, "discarding stale failure");
            return Commit::Stale;
        }
        self.slot = Slot::Failed(error);
        Commit::Committed
    }

    /// Settle with either outcome.
    pub fn settle(&mut self, generation: Generation, result: Result<T, RequestError>) -> Commit {
        match result {
            Ok(value) => self.resolve(generation, value),
            Err(error) => self.reject(generation, error),
        }
    }

    /// Force the operation back to idle.
    ///
    /// The generation counter is kept, so a request begun before the reset
    /// can no longer commit and the next `begin` still moves forward.
    pub fn reset(&mut self) {
        self.slot = Slot::Idle;
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> OperationStatus {
        match self.slot {
            Slot::Idle => OperationStatus::Idle,
            Slot::Pending => OperationStatus::Pending,
            Slot::Succeeded(_) => OperationStatus::Succeeded,
            Slot::Failed(_) => OperationStatus::Failed,
        }
    }

    /// Latest generation handed out by [`Self::begin`].
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// True while a request is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.slot, Slot::Pending)
    }

    /// Value of the latest request, only when it succeeded.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match &self.slot {
            Slot::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// Error of the latest request, only when it failed.
    #[must_use]
    pub const fn error(&self) -> Option<&RequestError> {
        match &self.slot {
            Slot::Failed(error) => Some(error),
            _ => None,
        }
    }

    fn accepts(&self, generation: Generation) -> bool {
        generation == self.generation && self.is_pending()
    }
}
