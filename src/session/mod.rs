//! Client-side session state: the conversation, formula analyses, and the
//! driver that ties them to an assistant backend.

pub mod analysis;
pub mod conversation;
pub mod driver;
pub mod formula;
pub mod message;
pub mod operation;

pub use analysis::{
    AnalysisKind, DebugResult, ExplanationResult, FormulaComponent, ResultSection,
    ValidationResult,
};
pub use conversation::{ConversationThread, PendingQuery, QueryCompletion};
pub use driver::{Applied, AssistantSession};
pub use formula::{AnalysisCompletion, AnalysisOutcome, AnalysisRequest, FormulaAnalysisSession};
pub use message::{Message, Role};
pub use operation::{AsyncOperation, Commit, Generation, OperationStatus};
