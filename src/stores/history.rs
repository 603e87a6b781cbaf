//! Searchable log of past queries.
//!
//! The log is not wired to the live conversation: sending a chat message does
//! not record an entry, and repeating an entry does not add one either.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ids::EntryId;
use crate::stores::contains_folded;

/// Something that can take a query and send it to the assistant.
pub trait QuerySink {
    /// Submit `text` as a new query. Returns `false` if it was ignored.
    fn submit_query(&mut self, text: &str) -> bool;
}

/// One past query.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier within the store.
    pub id: EntryId,
    /// The query as typed.
    pub query_text: String,
    /// Day it was asked.
    pub date: NaiveDate,
    /// Time of day it was asked.
    pub time: NaiveTime,
}

impl HistoryEntry {
    /// Build an entry asked at `at`.
    #[must_use]
    pub fn new(query_text: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            id: EntryId::new(),
            query_text: query_text.into(),
            date: at.date(),
            time: at.time(),
        }
    }
}

/// Query history in insertion order.
#[derive(Clone, Debug, Default)]
pub struct QueryHistoryStore {
    entries: Arc<Vec<HistoryEntry>>,
}

impl QueryHistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entries` in the given order.
    #[must_use]
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Append a query asked now.
    pub fn record(&mut self, query_text: impl Into<String>) -> EntryId {
        self.record_at(query_text, Utc::now().naive_utc())
    }

    /// Append a query asked at `at`.
    pub fn record_at(&mut self, query_text: impl Into<String>, at: NaiveDateTime) -> EntryId {
        let entry = HistoryEntry::new(query_text, at);
        let id = entry.id;
        Arc::make_mut(&mut self.entries).push(entry);
        id
    }

    /// Entries whose query contains `needle`, ignoring case, in store order.
    ///
    /// The iterator is lazy and can be cloned to walk the matches again.
    pub fn filter<'a>(
        &'a self,
        needle: &str,
    ) -> impl Iterator<Item = &'a HistoryEntry> + Clone + use<'a> {
        let needle = needle.to_lowercase();
        self.entries
            .iter()
            .filter(move |entry| contains_folded(&entry.query_text, &needle))
    }

    /// Remove every entry. Clearing an empty store does nothing.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        debug!(count = self.entries.len(), "clearing query history");
        self.entries = Arc::new(Vec::new());
    }

    /// Send the entry's query to `sink` again.
    ///
    /// The store itself is left untouched. Returns `false` if `id` is unknown
    /// or the sink ignored the query.
    pub fn repeat(&self, id: EntryId, sink: &mut dyn QuerySink) -> bool {
        match self.get(id) {
            Some(entry) => sink.submit_query(&entry.query_text),
            None => false,
        }
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Shared, immutable view of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<HistoryEntry>> {
        Arc::clone(&self.entries)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
