//! User-curated archive of question/answer pairs.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ids::ArtifactId;
use crate::stores::contains_folded;

/// A saved question with the answer it received.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SavedArtifact {
    /// Unique identifier within the store.
    pub id: ArtifactId,
    /// The question.
    pub query_text: String,
    /// The answer, as markdown.
    pub response_text: String,
    /// Day it was saved.
    pub date: NaiveDate,
    /// Whether the answer is unfolded in the list. View state only, never serialized.
    #[serde(skip)]
    pub expanded: bool,
}

impl SavedArtifact {
    /// Build a collapsed artifact saved on `date`.
    #[must_use]
    pub fn new(
        query_text: impl Into<String>,
        response_text: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            query_text: query_text.into(),
            response_text: response_text.into(),
            date,
            expanded: false,
        }
    }
}

/// Saved artifacts in insertion order.
#[derive(Clone, Debug, Default)]
pub struct SavedArtifactStore {
    artifacts: Arc<Vec<SavedArtifact>>,
}

impl SavedArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `artifacts` in the given order.
    #[must_use]
    pub fn from_artifacts(artifacts: Vec<SavedArtifact>) -> Self {
        Self {
            artifacts: Arc::new(artifacts),
        }
    }

    /// Save a question/answer pair dated today.
    pub fn save(
        &mut self,
        query_text: impl Into<String>,
        response_text: impl Into<String>,
    ) -> ArtifactId {
        let artifact = SavedArtifact::new(query_text, response_text, Utc::now().date_naive());
        let id = artifact.id;
        Arc::make_mut(&mut self.artifacts).push(artifact);
        id
    }

    /// Artifacts whose question contains `needle`, ignoring case, in store order.
    pub fn filter<'a>(
        &'a self,
        needle: &str,
    ) -> impl Iterator<Item = &'a SavedArtifact> + Clone + use<'a> {
        let needle = needle.to_lowercase();
        self.artifacts
            .iter()
            .filter(move |artifact| contains_folded(&artifact.query_text, &needle))
    }

    /// Flip the expanded flag of one artifact. Returns `false` if `id` is unknown.
    pub fn toggle_expanded(&mut self, id: ArtifactId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let artifact = &mut Arc::make_mut(&mut self.artifacts)[index];
        artifact.expanded = !artifact.expanded;
        true
    }

    /// Delete one artifact. Returns `false`, changing nothing, if `id` is unknown.
    pub fn remove(&mut self, id: ArtifactId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        Arc::make_mut(&mut self.artifacts).remove(index);
        debug!(%id, "saved artifact removed");
        true
    }

    /// Answer text of one artifact, for copying elsewhere.
    #[must_use]
    pub fn copy(&self, id: ArtifactId) -> Option<&str> {
        self.get(id).map(|artifact| artifact.response_text.as_str())
    }

    /// First `max_chars` characters of the answer, with an ellipsis when cut.
    #[must_use]
    pub fn preview(&self, id: ArtifactId, max_chars: usize) -> Option<String> {
        let text = self.copy(id)?;
        if text.chars().count() <= max_chars {
            return Some(text.to_string());
        }
        let mut preview: String = text.chars().take(max_chars).collect();
        preview.push_str("...");
        Some(preview)
    }

    /// Look up one artifact.
    #[must_use]
    pub fn get(&self, id: ArtifactId) -> Option<&SavedArtifact> {
        self.artifacts.iter().find(|artifact| artifact.id == id)
    }

    /// All artifacts in insertion order.
    #[must_use]
    pub fn artifacts(&self) -> &[SavedArtifact] {
        &self.artifacts
    }

    /// Shared, immutable view of the current artifacts.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<SavedArtifact>> {
        Arc::clone(&self.artifacts)
    }

    /// Number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True when there are no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn position(&self, id: ArtifactId) -> Option<usize> {
        self.artifacts.iter().position(|artifact| artifact.id == id)
    }
}
