//! Non-item entities: notes, links, lists and journal records.
//!
//! All of them share the `entries` table and differ by `kind`. Lists,
//! journals and journal prompts are containers; the rest are leaves.

use crate::model::reference::{EntityId, EntityKind, EntityRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: EntityId,
    pub kind: EntryKind,
    pub user_id: EntityId,
    pub title: String,
    /// Free text body (note text, prompt text, fragment text).
    pub body: Option<String>,
    /// Target URL for links.
    pub url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EntryRecord {
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.kind.entity_kind(), self.id)
    }
}

/// Kinds stored in `entries`; a strict subset of [`EntityKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    List,
    Link,
    Note,
    Journal,
    JournalFragment,
    JournalPrompt,
}

impl EntryKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::List => EntityKind::List,
            Self::Link => EntityKind::Link,
            Self::Note => EntityKind::Note,
            Self::Journal => EntityKind::Journal,
            Self::JournalFragment => EntityKind::JournalFragment,
            Self::JournalPrompt => EntityKind::JournalPrompt,
        }
    }

    pub fn from_entity_kind(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::List => Some(Self::List),
            EntityKind::Link => Some(Self::Link),
            EntityKind::Note => Some(Self::Note),
            EntityKind::Journal => Some(Self::Journal),
            EntityKind::JournalFragment => Some(Self::JournalFragment),
            EntityKind::JournalPrompt => Some(Self::JournalPrompt),
            EntityKind::Day | EntityKind::Item => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.entity_kind().as_str()
    }

    pub fn parse(value: &str) -> Option<Self> {
        EntityKind::parse(value).and_then(Self::from_entity_kind)
    }
}

/// Insert payload for a new entry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub user_id: EntityId,
    pub title: String,
    pub body: Option<String>,
    pub url: Option<String>,
}

impl NewEntry {
    pub fn new(kind: EntryKind, user_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            kind,
            user_id,
            title: title.into(),
            body: None,
            url: None,
        }
    }

    pub fn note(user_id: EntityId, body: impl Into<String>) -> Self {
        let mut entry = Self::new(EntryKind::Note, user_id, "");
        entry.body = Some(body.into());
        entry
    }

    pub fn link(user_id: EntityId, title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut entry = Self::new(EntryKind::Link, user_id, title);
        entry.url = Some(url.into());
        entry
    }

    /// Copy of an existing entry for another owner.
    pub fn cloned_from(record: &EntryRecord, user_id: EntityId) -> Self {
        Self {
            kind: record.kind,
            user_id,
            title: record.title.clone(),
            body: record.body.clone(),
            url: record.url.clone(),
        }
    }
}
