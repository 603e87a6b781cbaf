//! Append-only conversation transcript driven by one operation slot.
//!
//! A submission appends the user message immediately, before the backend has
//! answered, and exactly one assistant message once it has: the real answer
//! or the fallback apology. The transcript never rolls back. The operation
//! slot and the error banner, on the other hand, only ever reflect the most
//! recent submission; late completions of older submissions still add their
//! assistant message but cannot touch either.
//!
//! Overlapping submissions can interleave the transcript (`Q1, Q2, A2, A1`),
//! so every assistant message remembers which user message it answers.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::assistant::client::AssistantClient;
use crate::core::config::ConversationConfig;
use crate::core::errors::{InputError, RequestError, RequestResult};
use crate::core::ids::MessageId;
use crate::session::message::{Message, Role};
use crate::session::operation::{AsyncOperation, Commit, Generation};

/// A submission whose backend call has not been made yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingQuery {
    generation: Generation,
    question: MessageId,
    text: String,
}

impl PendingQuery {
    /// Generation this submission was given.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Text sent to the backend.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// User message this submission appended.
    #[must_use]
    pub const fn question(&self) -> MessageId {
        self.question
    }

    /// Package an answer for [`ConversationThread::settle`].
    #[must_use]
    pub const fn complete(&self, result: RequestResult<String>) -> QueryCompletion {
        QueryCompletion {
            generation: self.generation,
            question: self.question,
            result,
        }
    }

    /// Call the backend and package the answer.
    pub async fn execute(self, client: &dyn AssistantClient) -> QueryCompletion {
        let result = client.query(&self.text).await;
        self.complete(result)
    }
}

/// Backend answer to a [`PendingQuery`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCompletion {
    /// Generation of the submission being answered.
    pub generation: Generation,
    /// User message being answered.
    pub question: MessageId,
    /// Answer text or failure.
    pub result: RequestResult<String>,
}

/// Ordered chat log plus the state of the latest submission.
#[derive(Clone, Debug, Default)]
pub struct ConversationThread {
    messages: Vec<Message>,
    // answer id -> question id
    replies: HashMap<MessageId, MessageId>,
    operation: AsyncOperation<String>,
    banner: Option<String>,
    config: ConversationConfig,
}

impl ConversationThread {
    /// Create an empty thread with default texts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty thread with custom texts.
    #[must_use]
    pub fn with_config(config: ConversationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Append the user message and begin a new request.
    ///
    /// # Errors
    /// Returns [`InputError::Empty`] for blank text; nothing changes in that case.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingQuery, InputError> {
        if text.trim().is_empty() {
            return Err(InputError::Empty);
        }

        let question = Message::user(text);
        let question_id = question.id;
        self.messages.push(question);
        self.banner = None;
        let generation = self.operation.begin();
        debug!(%generation, "query submitted");

        Ok(PendingQuery {
            generation,
            question: question_id,
            text: text.to_string(),
        })
    }

    /// Fold a backend answer into the transcript.
    ///
    /// Always appends one assistant message. Only a completion for the latest
    /// submission updates the operation and the banner.
    pub fn settle(&mut self, completion: QueryCompletion) -> Commit {
        let QueryCompletion {
            generation,
            question,
            result,
        } = completion;
        let (answer, commit) = match result {
            Ok(content) => {
                let answer = Message::assistant(content.as_str());
                (answer, self.operation.resolve(generation, content))
            }
            Err(error) => {
                let banner = banner_text(&error, &self.config.failure_banner);
                let reason = error.to_string();
                let commit = self.operation.reject(generation, error);
                if commit.is_committed() {
                    warn!(%generation, error = %reason, "query failed");
                    self.banner = Some(banner);
                }
                let answer = Message::assistant(self.config.fallback_message.as_str());
                (answer, commit)
            }
        };
        self.replies.insert(answer.id, question);
        self.messages.push(answer);
        commit
    }

    /// Submit `text` and wait for the answer.
    ///
    /// Returns `None` without touching any state when `text` is blank.
    pub async fn submit(&mut self, client: &dyn AssistantClient, text: &str) -> Option<Commit> {
        let pending = match self.begin_submit(text) {
            Ok(pending) => pending,
            Err(err) => {
                debug!(%err, "ignoring submission");
                return None;
            }
        };
        let completion = pending.execute(client).await;
        Some(self.settle(completion))
    }

    /// Transcript in append order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The user message an assistant message answers.
    #[must_use]
    pub fn question_for(&self, answer: MessageId) -> Option<&Message> {
        let question = self.replies.get(&answer)?;
        self.messages.iter().find(|m| m.id == *question)
    }

    /// The most recent assistant message and the question it answers.
    #[must_use]
    pub fn last_exchange(&self) -> Option<(&Message, &Message)> {
        let answer = self.messages.iter().rev().find(|m| m.role == Role::Assistant)?;
        Some((self.question_for(answer.id)?, answer))
    }

    /// State of the latest submission.
    #[must_use]
    pub const fn operation(&self) -> &AsyncOperation<String> {
        &self.operation
    }

    /// True while the latest submission is waiting for its answer.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.operation.is_pending()
    }

    /// Transient error text for the latest failed submission.
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Hide the error banner.
    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }
}

fn banner_text(error: &RequestError, fallback: &str) -> String {
    match error {
        RequestError::Status { message, .. } | RequestError::Backend(message)
            if !message.trim().is_empty() =>
        {
            message.clone()
        }
        _ => fallback.to_string(),
    }
}
