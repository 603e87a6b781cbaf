//! Single owner of all session state.
//!
//! Backend calls run as spawned tasks and report back over a channel. State is
//! only ever mutated here, either synchronously by a user action or when
//! [`AssistantSession::next_completion`] folds a finished call in. That keeps
//! each store free of locks and makes stale answers a matter of generation
//! bookkeeping rather than of task cancellation.
//!
//! A backend task that panics still reports back: its generation settles as
//! a [`RequestError::Backend`] failure, so no slot is left pending.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::assistant::client::AssistantClient;
use crate::capabilities::{Clipboard, Notice, Notifier};
use crate::core::config::ConversationConfig;
use crate::core::errors::RequestError;
use crate::core::ids::{ArtifactId, EntryId};
use crate::session::analysis::AnalysisKind;
use crate::session::conversation::{ConversationThread, QueryCompletion};
use crate::session::formula::{AnalysisCompletion, FormulaAnalysisSession};
use crate::session::operation::{Commit, Generation};
use crate::stores::{QueryHistoryStore, QuerySink, SavedArtifactStore};

enum Completion {
    Query(QueryCompletion),
    Analysis(AnalysisCompletion),
}

/// What [`AssistantSession::next_completion`] folded into the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A conversation answer arrived.
    Query(Commit),
    /// A formula analysis answer arrived.
    Analysis(AnalysisKind, Commit),
}

/// Conversation, formula analyses, and both stores behind one event loop.
pub struct AssistantSession {
    client: Arc<dyn AssistantClient>,
    notifier: Arc<dyn Notifier>,
    conversation: ConversationThread,
    formula: FormulaAnalysisSession,
    history: QueryHistoryStore,
    saved: SavedArtifactStore,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl AssistantSession {
    /// Create a session with empty stores and default conversation texts.
    pub fn new(client: Arc<dyn AssistantClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(client, notifier, ConversationConfig::default())
    }

    /// Create a session with custom conversation texts.
    pub fn with_config(
        client: Arc<dyn AssistantClient>,
        notifier: Arc<dyn Notifier>,
        config: ConversationConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            notifier,
            conversation: ConversationThread::with_config(config),
            formula: FormulaAnalysisSession::new(),
            history: QueryHistoryStore::new(),
            saved: SavedArtifactStore::new(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Replace the query history.
    #[must_use]
    pub fn with_history(mut self, history: QueryHistoryStore) -> Self {
        self.history = history;
        self
    }

    /// Replace the saved artifacts.
    #[must_use]
    pub fn with_saved(mut self, saved: SavedArtifactStore) -> Self {
        self.saved = saved;
        self
    }

    /// Send a chat message.
    ///
    /// The user message is appended at once and the backend call is spawned on
    /// the current tokio runtime. Returns `false`, changing nothing, for blank text.
    pub fn dispatch_query(&mut self, text: &str) -> bool {
        let pending = match self.conversation.begin_submit(text) {
            Ok(pending) => pending,
            Err(err) => {
                debug!(%err, "ignoring submission");
                return false;
            }
        };
        let lost = Completion::Query(pending.complete(Err(task_lost())));
        let client = Arc::clone(&self.client);
        self.spawn(
            async move { Completion::Query(pending.execute(&*client).await) },
            lost,
        );
        true
    }

    /// Start one formula analysis against the current formula.
    pub fn dispatch_analysis(&mut self, kind: AnalysisKind) -> Generation {
        let request = self.formula.begin(kind);
        let generation = request.generation();
        let lost = Completion::Analysis(request.fail(task_lost()));
        let client = Arc::clone(&self.client);
        self.spawn(
            async move { Completion::Analysis(request.execute(&*client).await) },
            lost,
        );
        generation
    }

    // `lost` is delivered instead when the task panics or is cancelled.
    fn spawn<F>(&mut self, task: F, lost: Completion)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(err) => {
                    warn!(%err, "backend task ended without an answer");
                    lost
                }
            };
            if tx.send(completion).is_err() {
                debug!("session dropped before completion arrived");
            }
        });
    }

    /// Wait for the next backend call to finish and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Applied> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(self.apply(completion))
    }

    /// Apply completions until nothing is in flight. Returns how many were applied.
    pub async fn settle_all(&mut self) -> usize {
        let mut applied = 0;
        while self.next_completion().await.is_some() {
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, completion: Completion) -> Applied {
        match completion {
            Completion::Query(completion) => Applied::Query(self.conversation.settle(completion)),
            Completion::Analysis(completion) => {
                let kind = completion.outcome.kind();
                Applied::Analysis(kind, self.formula.settle(completion))
            }
        }
    }

    /// Number of backend calls not yet applied.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Send a past query to the assistant again. The history is left as is.
    pub fn repeat_history(&mut self, id: EntryId) -> bool {
        let history = self.history.clone();
        let Some(entry) = history.get(id) else {
            return false;
        };
        if !history.repeat(id, self) {
            return false;
        }
        self.notifier.notify(Notice::new(
            "Query repeated",
            format!("\"{}\" has been sent to the assistant.", entry.query_text),
        ));
        true
    }

    /// Empty the query history.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.notifier.notify(Notice::new(
            "History cleared",
            "Your search history has been cleared.",
        ));
    }

    /// Delete a saved artifact. Unknown ids are ignored.
    pub fn remove_saved(&mut self, id: ArtifactId) -> bool {
        if !self.saved.remove(id) {
            return false;
        }
        self.notifier.notify(Notice::new(
            "Query deleted",
            "The saved query has been deleted.",
        ));
        true
    }

    /// Fold or unfold a saved artifact.
    pub fn toggle_saved(&mut self, id: ArtifactId) -> bool {
        self.saved.toggle_expanded(id)
    }

    /// Put a saved answer on the clipboard.
    pub fn copy_saved(&self, id: ArtifactId, clipboard: &dyn Clipboard) -> bool {
        let Some(text) = self.saved.copy(id) else {
            return false;
        };
        match clipboard.write_text(text) {
            Ok(()) => {
                self.notifier.notify(Notice::new(
                    "Copied to clipboard",
                    "The content has been copied to your clipboard.",
                ));
                true
            }
            Err(err) => {
                warn!(%id, %err, "clipboard write failed");
                false
            }
        }
    }

    /// Save the latest answer together with the question it answers.
    pub fn save_last_exchange(&mut self) -> Option<ArtifactId> {
        let (question, answer) = self.conversation.last_exchange()?;
        let id = self
            .saved
            .save(question.content.as_str(), answer.content.as_str());
        Some(id)
    }

    /// Hide the conversation error banner.
    pub fn dismiss_banner(&mut self) {
        self.conversation.dismiss_banner();
    }

    /// The conversation.
    #[must_use]
    pub const fn conversation(&self) -> &ConversationThread {
        &self.conversation
    }

    /// The formula analyses.
    #[must_use]
    pub const fn formula(&self) -> &FormulaAnalysisSession {
        &self.formula
    }

    /// Formula and error message editing.
    pub const fn formula_mut(&mut self) -> &mut FormulaAnalysisSession {
        &mut self.formula
    }

    /// The query history.
    #[must_use]
    pub const fn history(&self) -> &QueryHistoryStore {
        &self.history
    }

    /// Direct access to the query history.
    pub const fn history_mut(&mut self) -> &mut QueryHistoryStore {
        &mut self.history
    }

    /// The saved artifacts.
    #[must_use]
    pub const fn saved(&self) -> &SavedArtifactStore {
        &self.saved
    }

    /// Direct access to the saved artifacts.
    pub const fn saved_mut(&mut self) -> &mut SavedArtifactStore {
        &mut self.saved
    }
}

fn task_lost() -> RequestError {
    RequestError::Backend("assistant task stopped before answering".to_string())
}

impl QuerySink for AssistantSession {
    fn submit_query(&mut self, text: &str) -> bool {
        self.dispatch_query(text)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::assistant::client::ClientFuture;
    use crate::assistant::testing::{Call, GatedClient, ScriptedClient};
    use crate::core::errors::RequestResult;
    use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};
    use crate::session::operation::OperationStatus;
    use crate::stores::HistoryEntry;

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn titles(&self) -> Vec<String> {
            self.notices
                .lock()
                .map(|n| n.iter().map(|notice| notice.title.clone()).collect())
                .unwrap_or_default()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            if let Ok(mut notices) = self.notices.lock() {
                notices.push(notice);
            }
        }
    }

    #[derive(Default)]
    struct MemoryClipboard {
        text: Mutex<Option<String>>,
    }

    impl Clipboard for MemoryClipboard {
        fn write_text(&self, text: &str) -> io::Result<()> {
            let mut slot = self
                .text
                .lock()
                .map_err(|_| io::Error::other("clipboard poisoned"))?;
            *slot = Some(text.to_string());
            Ok(())
        }
    }

    struct BrokenClipboard;

    /// Every call panics inside the backend task.
    struct CrashingClient;

    #[allow(clippy::panic)]
    impl AssistantClient for CrashingClient {
        fn query(&self, _text: &str) -> ClientFuture<'_, RequestResult<String>> {
            panic!("backend crashed")
        }

        fn validate_formula(
            &self,
            _formula: &str,
        ) -> ClientFuture<'_, RequestResult<ValidationResult>> {
            panic!("backend crashed")
        }

        fn explain_formula(
            &self,
            _formula: &str,
        ) -> ClientFuture<'_, RequestResult<ExplanationResult>> {
            panic!("backend crashed")
        }

        fn debug_formula(
            &self,
            _formula: &str,
            _error_message: Option<&str>,
        ) -> ClientFuture<'_, RequestResult<DebugResult>> {
            panic!("backend crashed")
        }
    }

    impl Clipboard for BrokenClipboard {
        fn write_text(&self, _text: &str) -> io::Result<()> {
            Err(io::Error::other("no display"))
        }
    }

    fn scripted_session(answer: &str) -> (AssistantSession, Arc<ScriptedClient>, Arc<RecordingNotifier>) {
        let client = Arc::new(ScriptedClient::answering(answer));
        let notifier = Arc::new(RecordingNotifier::default());
        let session = AssistantSession::new(client.clone(), notifier.clone());
        (session, client, notifier)
    }

    #[tokio::test]
    async fn test_blank_dispatch_does_nothing() {
        let (mut session, client, _) = scripted_session("unused");
        assert!(!session.dispatch_query("   "));
        assert_eq!(session.in_flight(), 0);
        assert_eq!(session.next_completion().await, None);
        assert!(session.conversation().messages().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_then_settle() {
        let (mut session, _, _) = scripted_session("Use SUMIFS.");
        assert!(session.dispatch_query("Sum with two conditions?"));
        assert_eq!(session.conversation().messages().len(), 1);
        assert!(session.conversation().is_loading());

        assert_eq!(session.settle_all().await, 1);
        assert_eq!(session.conversation().messages().len(), 2);
        assert_eq!(session.conversation().messages()[1].content, "Use SUMIFS.");
        assert!(!session.conversation().is_loading());
    }

    #[tokio::test]
    async fn test_out_of_order_answers_latest_wins() {
        let client = Arc::new(GatedClient::default());
        let first = client.gate_query("first");
        let second = client.gate_query("second");
        let mut session = AssistantSession::new(client.clone(), Arc::new(RecordingNotifier::default()));

        assert!(session.dispatch_query("first"));
        assert!(session.dispatch_query("second"));
        assert_eq!(session.in_flight(), 2);

        let _ = second.send(Ok("answer two".to_string()));
        assert_eq!(
            session.next_completion().await,
            Some(Applied::Query(Commit::Committed))
        );

        let _ = first.send(Err(RequestError::Timeout));
        assert_eq!(
            session.next_completion().await,
            Some(Applied::Query(Commit::Stale))
        );

        let conversation = session.conversation();
        assert_eq!(conversation.messages().len(), 4);
        assert_eq!(conversation.operation().status(), OperationStatus::Succeeded);
        assert_eq!(
            conversation.operation().value().map(String::as_str),
            Some("answer two")
        );
        assert!(conversation.banner().is_none());
    }

    #[tokio::test]
    async fn test_analyses_complete_independently() {
        let client = Arc::new(GatedClient::default());
        let validation = client.gate_validation("=A1/B1");
        let mut session = AssistantSession::new(client.clone(), Arc::new(RecordingNotifier::default()));
        session.formula_mut().set_formula("=A1/B1");

        session.dispatch_analysis(AnalysisKind::Validate);
        session.dispatch_analysis(AnalysisKind::Explain);

        assert_eq!(
            session.next_completion().await,
            Some(Applied::Analysis(AnalysisKind::Explain, Commit::Committed))
        );
        assert_eq!(
            session.formula().status(AnalysisKind::Validate),
            OperationStatus::Pending
        );

        let _ = validation.send(Ok(ValidationResult {
            is_valid: false,
            explanation: "Divides by B1".to_string(),
            issues: vec!["#DIV/0! when B1 is empty".to_string()],
            ..ValidationResult::default()
        }));
        assert_eq!(
            session.next_completion().await,
            Some(Applied::Analysis(AnalysisKind::Validate, Commit::Committed))
        );
        assert!(
            session
                .formula()
                .validation()
                .value()
                .is_some_and(|v| !v.is_valid)
        );
        assert!(!session.formula().is_busy());
    }

    #[tokio::test]
    async fn test_repeat_history_resubmits_and_notifies() {
        let (session, client, notifier) = scripted_session("Pivot answer");
        let history = QueryHistoryStore::from_entries(vec![HistoryEntry::new(
            "How to create a pivot table?",
            chrono::NaiveDateTime::default(),
        )]);
        let id = history.entries()[0].id;
        let mut session = session.with_history(history);

        assert!(session.repeat_history(id));
        session.settle_all().await;

        assert_eq!(
            client.calls(),
            [Call::Query("How to create a pivot table?".to_string())]
        );
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.conversation().messages().len(), 2);
        assert_eq!(notifier.titles(), ["Query repeated"]);

        assert!(!session.repeat_history(EntryId::new()));
        assert_eq!(notifier.titles().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history_twice() {
        let (session, _, notifier) = scripted_session("");
        let mut history = QueryHistoryStore::new();
        history.record("How do I use VLOOKUP?");
        let mut session = session.with_history(history);

        session.clear_history();
        session.clear_history();

        assert!(session.history().is_empty());
        assert_eq!(notifier.titles(), ["History cleared", "History cleared"]);
    }

    #[tokio::test]
    async fn test_saved_actions() {
        let (session, _, notifier) = scripted_session("");
        let mut saved = SavedArtifactStore::new();
        let id = saved.save("VLOOKUP?", "# VLOOKUP\nLooks up a value.");
        let mut session = session.with_saved(saved);

        assert!(!session.remove_saved(ArtifactId::new()));
        assert_eq!(session.saved().len(), 1);
        assert!(notifier.titles().is_empty());

        assert!(session.toggle_saved(id));
        assert!(session.saved().get(id).is_some_and(|a| a.expanded));

        let clipboard = MemoryClipboard::default();
        assert!(session.copy_saved(id, &clipboard));
        assert_eq!(
            clipboard.text.lock().map(|t| t.clone()).unwrap_or_default().as_deref(),
            Some("# VLOOKUP\nLooks up a value.")
        );
        assert!(!session.copy_saved(id, &BrokenClipboard));

        assert!(session.remove_saved(id));
        assert!(session.saved().is_empty());
        assert_eq!(notifier.titles(), ["Copied to clipboard", "Query deleted"]);
    }

    #[tokio::test]
    async fn test_crashed_backend_task_settles_as_failure() {
        let mut session =
            AssistantSession::new(Arc::new(CrashingClient), Arc::new(RecordingNotifier::default()));
        session.formula_mut().set_formula("=A1/B1");

        assert!(session.dispatch_query("hello"));
        session.dispatch_analysis(AnalysisKind::Validate);

        let settled = tokio::time::timeout(Duration::from_secs(5), session.settle_all()).await;
        assert_eq!(settled.unwrap_or_default(), 2);
        assert_eq!(session.in_flight(), 0);

        let conversation = session.conversation();
        assert_eq!(conversation.operation().status(), OperationStatus::Failed);
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(
            conversation.messages()[1].content,
            ConversationConfig::default().fallback_message
        );
        assert!(conversation.banner().is_some());
        assert_eq!(
            session.formula().status(AnalysisKind::Validate),
            OperationStatus::Failed
        );
        assert_eq!(
            session.formula().error(AnalysisKind::Validate),
            Some(&task_lost())
        );
    }

    #[tokio::test]
    async fn test_save_last_exchange_after_out_of_order_answers() {
        let client = Arc::new(GatedClient::default());
        let first = client.gate_query("Q1");
        let second = client.gate_query("Q2");
        let mut session = AssistantSession::new(client.clone(), Arc::new(RecordingNotifier::default()));

        session.dispatch_query("Q1");
        session.dispatch_query("Q2");
        let _ = second.send(Ok("A2".to_string()));
        session.next_completion().await;
        let _ = first.send(Ok("A1".to_string()));
        session.next_completion().await;

        let id = session.save_last_exchange();
        let artifact = id.and_then(|id| session.saved().get(id));
        assert_eq!(
            artifact.map(|a| (a.query_text.as_str(), a.response_text.as_str())),
            Some(("Q1", "A1"))
        );
    }

    #[tokio::test]
    async fn test_save_last_exchange() {
        let (mut session, _, _) = scripted_session("Use INDEX/MATCH.");
        assert_eq!(session.save_last_exchange(), None);

        session.dispatch_query("Better than VLOOKUP?");
        session.settle_all().await;

        let id = session.save_last_exchange();
        let artifact = id.and_then(|id| session.saved().get(id));
        assert_eq!(
            artifact.map(|a| (a.query_text.as_str(), a.response_text.as_str())),
            Some(("Better than VLOOKUP?", "Use INDEX/MATCH."))
        );
    }
}
