//! Typed identifiers for messages, history entries and saved artifacts.
//!
//! All three share one representation, [`Id`], tagged with a zero-sized kind
//! so an `EntryId` can never be handed to the saved-artifact store.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: message and history ids become `UUIDv7` and sort by creation time.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// What an [`Id`] identifies, and how fresh ids are drawn.
pub trait IdKind {
    /// Name used by `Debug`.
    const LABEL: &'static str;

    /// Draw a fresh UUID for this kind.
    fn generate() -> Uuid;
}

/// Chat messages.
#[derive(Debug)]
pub enum MessageKind {}

/// Query history entries.
#[derive(Debug)]
pub enum EntryKind {}

/// Saved question/answer artifacts.
#[derive(Debug)]
pub enum ArtifactKind {}

fn time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

impl IdKind for MessageKind {
    const LABEL: &'static str = "MessageId";

    fn generate() -> Uuid {
        time_ordered()
    }
}

impl IdKind for EntryKind {
    const LABEL: &'static str = "EntryId";

    fn generate() -> Uuid {
        time_ordered()
    }
}

// Artifact ids may leave the session (export, clipboard), so they stay random.
impl IdKind for ArtifactKind {
    const LABEL: &'static str = "ArtifactId";

    fn generate() -> Uuid {
        Uuid::new_v4()
    }
}

/// Identifier of a chat message inside a conversation thread.
pub type MessageId = Id<MessageKind>;
/// Identifier of a query history entry.
pub type EntryId = Id<EntryKind>;
/// Identifier of a saved question/answer artifact.
pub type ArtifactId = Id<ArtifactKind>;

/// UUID tagged with the kind of record it names.
pub struct Id<K> {
    uuid: Uuid,
    kind: PhantomData<fn() -> K>,
}

impl<K: IdKind> Id<K> {
    /// Draw a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::from_uuid(K::generate())
    }
}

impl<K> Id<K> {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            kind: PhantomData,
        }
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl<K: IdKind> Default for Id<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::LABEL, self.uuid)
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.uuid, f)
    }
}

impl<K> FromStr for Id<K> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from_uuid)
    }
}

impl<K> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uuid.serialize(serializer)
    }
}

impl<'de, K> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}
