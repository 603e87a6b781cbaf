//! Assistant backends: the client capability and its implementations.

pub mod client;
pub mod http;
pub mod llm;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AssistantClient, ClientFuture};
pub use http::HttpAssistantClient;
pub use llm::{LlmAssistant, TextGenerator};
