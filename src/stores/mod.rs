//! In-memory collections shown next to the live conversation.
//!
//! Both stores keep their records behind an `Arc<Vec<_>>` and copy on write,
//! so a snapshot handed to a renderer stays consistent while the store moves on.

pub mod history;
pub mod saved;

pub use history::{HistoryEntry, QueryHistoryStore, QuerySink};
pub use saved::{SavedArtifact, SavedArtifactStore};

/// Case-insensitive containment test. `needle` must already be lowercase.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}
