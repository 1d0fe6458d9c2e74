//! Typed references between entities.
//!
//! # Responsibility
//! - Identify any child entity by `(kind, id)` without owning it.
//! - Keep the persisted single-key map shape `{"Item": 123}`.
//!
//! # Invariants
//! - A serialized reference has exactly one key naming a known kind.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Numeric identifier shared by every entity table.
pub type EntityId = i64;

/// Discriminator for every entity kind that can appear in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Day,
    Item,
    List,
    Link,
    Note,
    Journal,
    JournalFragment,
    JournalPrompt,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Day,
        EntityKind::Item,
        EntityKind::List,
        EntityKind::Link,
        EntityKind::Note,
        EntityKind::Journal,
        EntityKind::JournalFragment,
        EntityKind::JournalPrompt,
    ];

    /// Type tag used in persisted reference maps and owner columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Item => "Item",
            Self::List => "List",
            Self::Link => "Link",
            Self::Note => "Note",
            Self::Journal => "Journal",
            Self::JournalFragment => "JournalFragment",
            Self::JournalPrompt => "JournalPrompt",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether entities of this kind may own an ordered collection.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Day | Self::Item | Self::List | Self::Journal | Self::JournalPrompt
        )
    }

    /// Whether entities of this kind live in the shared `entries` table.
    pub fn is_entry(self) -> bool {
        !matches!(self, Self::Day | Self::Item)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-owning pointer to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    pub fn day(id: EntityId) -> Self {
        Self::new(EntityKind::Day, id)
    }

    pub fn item(id: EntityId) -> Self {
        Self::new(EntityKind::Item, id)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Failure to parse the `Kind#id` text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRefError(String);

impl Display for ParseRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid reference `{}`; expected Kind#id such as Item#12", self.0)
    }
}

impl Error for ParseRefError {}

impl FromStr for EntityRef {
    type Err = ParseRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (tag, id) = value
            .trim()
            .split_once('#')
            .ok_or_else(|| ParseRefError(value.to_string()))?;
        let kind = EntityKind::parse(tag).ok_or_else(|| ParseRefError(value.to_string()))?;
        let id = id.parse().map_err(|_| ParseRefError(value.to_string()))?;
        Ok(Self::new(kind, id))
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.id)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntityRefVisitor)
    }
}

struct EntityRefVisitor;

impl<'de> Visitor<'de> for EntityRefVisitor {
    type Value = EntityRef;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("a single-key map such as {\"Item\": 123}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let (tag, id) = map
            .next_entry::<String, EntityId>()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        if map.next_key::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(2, &self));
        }
        let kind = EntityKind::parse(&tag)
            .ok_or_else(|| de::Error::unknown_variant(&tag, &KIND_NAMES))?;
        Ok(EntityRef { kind, id })
    }
}

static KIND_NAMES: [&str; 8] = [
    "Day",
    "Item",
    "List",
    "Link",
    "Note",
    "Journal",
    "JournalFragment",
    "JournalPrompt",
];
