//! Day domain model.
//!
//! # Invariants
//! - One day per `(user_id, date)`.
//! - `imported_from`/`imported_to` are written at most once and never cleared.

use crate::model::reference::{EntityId, EntityRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type DayId = EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    Open,
    Closed,
}

impl DayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl Display for DayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub id: DayId,
    pub user_id: EntityId,
    pub date: NaiveDate,
    pub state: DayState,
    pub closed_at: Option<i64>,
    pub reopened_at: Option<i64>,
    /// Day this one received a migration from.
    pub imported_from: Option<DayId>,
    /// Day this one was migrated into.
    pub imported_to: Option<DayId>,
    pub imported_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DayRecord {
    pub fn reference(&self) -> EntityRef {
        EntityRef::day(self.id)
    }

    pub fn is_migrated(&self) -> bool {
        self.imported_to.is_some()
    }
}
