//! LLM runtimes used by the server-side assistant.

pub mod ollama;

pub use ollama::OllamaClient;
