//! Core identifiers, errors and configuration.

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{
    AssistantConfig, BackendConfig, ConversationConfig, GenerationConfig, LlmConfig, ServerConfig,
};
pub use errors::{AssistantError, AssistantResult, InputError, RequestError, RequestResult};
pub use ids::{ArtifactId, EntryId, Id, IdKind, MessageId};
