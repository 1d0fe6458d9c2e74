//! Item domain model.
//!
//! # Responsibility
//! - Define item kinds, states and the persisted item record.
//! - Own the state-lock rules for sections and trackables.
//!
//! # Invariants
//! - `Section` and `Trackable` items are always `Todo`.
//! - `extra_data` is always a JSON object.
//! - `deferred_at`/`deferred_to` are set only while `state == Deferred`.

use crate::model::reference::{EntityId, EntityRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Identifier of a row in `items`.
pub type ItemId = EntityId;

/// Key in `extra_data` marking a user-configured permanent section.
pub const PERMANENT_SECTION_KEY: &str = "permanent_section";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Completable,
    Section,
    Reusable,
    Trackable,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completable => "completable",
            Self::Section => "section",
            Self::Reusable => "reusable",
            Self::Trackable => "trackable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completable" => Some(Self::Completable),
            "section" => Some(Self::Section),
            "reusable" => Some(Self::Reusable),
            "trackable" => Some(Self::Trackable),
            _ => None,
        }
    }

    /// Section and trackable items cannot leave `todo`.
    pub fn is_state_locked(self) -> bool {
        matches!(self, Self::Section | Self::Trackable)
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Todo,
    Done,
    Dropped,
    Deferred,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Done => "done",
            Self::Dropped => "dropped",
            Self::Deferred => "deferred",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(Self::Todo),
            "done" => Some(Self::Done),
            "dropped" => Some(Self::Dropped),
            "deferred" => Some(Self::Deferred),
            _ => None,
        }
    }

    /// Non-todo states sit in the parent's inactive list.
    pub fn is_active(self) -> bool {
        self == Self::Todo
    }
}

impl Display for ItemState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for item records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    BlankTitle,
    LockedState {
        item_type: ItemType,
        state: ItemState,
    },
    ExtraDataNotObject,
    DeferFieldsOutsideDeferred,
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "item title must not be blank"),
            Self::LockedState { item_type, state } => {
                write!(f, "{item_type} items must stay todo, got {state}")
            }
            Self::ExtraDataNotObject => write!(f, "item extra_data must be a JSON object"),
            Self::DeferFieldsOutsideDeferred => {
                write!(f, "deferred_at/deferred_to are only valid on deferred items")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// Persisted item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub user_id: EntityId,
    pub title: String,
    pub item_type: ItemType,
    pub state: ItemState,
    /// Epoch ms of the last transition into `Done`.
    pub done_at: Option<i64>,
    /// Epoch ms of the last transition into `Dropped`.
    pub dropped_at: Option<i64>,
    pub deferred_at: Option<i64>,
    pub deferred_to: Option<NaiveDate>,
    /// Provenance link to the item this one was copied from.
    pub source_item: Option<ItemId>,
    pub recurring_next_item: Option<ItemId>,
    pub extra_data: Value,
    /// Raw JSON recurrence rule, parsed on demand.
    pub recurrence_rule: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ItemRecord {
    pub fn reference(&self) -> EntityRef {
        EntityRef::item(self.id)
    }

    pub fn is_section(&self) -> bool {
        self.item_type == ItemType::Section
    }

    /// Whether `extra_data` carries the permanent-section flag.
    pub fn is_permanent_section(&self) -> bool {
        self.is_section()
            && self
                .extra_data
                .get(PERMANENT_SECTION_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_fields(&self.title, self.item_type, self.state, &self.extra_data)?;
        if self.state != ItemState::Deferred
            && (self.deferred_at.is_some() || self.deferred_to.is_some())
        {
            return Err(ItemValidationError::DeferFieldsOutsideDeferred);
        }
        Ok(())
    }
}

/// Insert payload for a new item row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub user_id: EntityId,
    pub title: String,
    pub item_type: ItemType,
    pub state: ItemState,
    pub source_item: Option<ItemId>,
    pub extra_data: Value,
    pub recurrence_rule: Option<String>,
}

impl NewItem {
    /// Fresh `todo` item with an empty data bag.
    pub fn new(user_id: EntityId, title: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            user_id,
            title: title.into(),
            item_type,
            state: ItemState::Todo,
            source_item: None,
            extra_data: Value::Object(Map::new()),
            recurrence_rule: None,
        }
    }

    /// Section item flagged as permanent.
    pub fn permanent_section(user_id: EntityId, title: impl Into<String>) -> Self {
        let mut item = Self::new(user_id, title, ItemType::Section);
        let mut data = Map::new();
        data.insert(PERMANENT_SECTION_KEY.to_string(), Value::Bool(true));
        item.extra_data = Value::Object(data);
        item
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_fields(&self.title, self.item_type, self.state, &self.extra_data)
    }
}

fn validate_fields(
    title: &str,
    item_type: ItemType,
    state: ItemState,
    extra_data: &Value,
) -> Result<(), ItemValidationError> {
    if title.trim().is_empty() {
        return Err(ItemValidationError::BlankTitle);
    }
    if item_type.is_state_locked() && state != ItemState::Todo {
        return Err(ItemValidationError::LockedState { item_type, state });
    }
    if !extra_data.is_object() {
        return Err(ItemValidationError::ExtraDataNotObject);
    }
    Ok(())
}
