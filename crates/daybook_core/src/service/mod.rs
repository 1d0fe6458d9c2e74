//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction scope: every public service call is one
//!   `BEGIN IMMEDIATE ... COMMIT`, rolled back on any error.
//!
//! # Invariants
//! - Internal helpers take a `Store` bound to the caller's transaction and
//!   never open nested transactions.

use crate::model::day::DayId;
use crate::model::item::{ItemId, ItemState, ItemType};
use crate::repo::{RepoError, Store};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection_service;
pub mod copy_service;
pub mod day_service;
pub mod defer_service;
pub mod item_service;
pub mod migration_service;
pub mod recurrence_service;
pub mod section_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by service operations.
///
/// Every variant is scoped to the failed call; the enclosing transaction has
/// already been rolled back when the caller sees it.
#[derive(Debug)]
pub enum ServiceError {
    /// Item is not in the state the transition requires.
    InvalidState {
        item_id: ItemId,
        expected: ItemState,
        actual: ItemState,
    },
    /// Section and trackable items cannot leave `todo`.
    StateLocked { item_id: ItemId, item_type: ItemType },
    /// Source day already has an `imported_to` link.
    AlreadyMigrated(DayId),
    /// Target day already received a migration.
    TargetAlreadyImported(DayId),
    /// Source and target of a migration are the same day.
    SameDayMigration(DayId),
    /// More than one deferred copy exists for one source item.
    DuplicateDeferredCopies { item_id: ItemId, copies: usize },
    /// Title is blank after trimming.
    InvalidTitle,
    /// Entity belongs to another user.
    Forbidden { user_id: i64 },
    /// Persistence or lookup failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState {
                item_id,
                expected,
                actual,
            } => write!(f, "item {item_id} must be {expected}, but is {actual}"),
            Self::StateLocked { item_id, item_type } => {
                write!(f, "item {item_id} is a {item_type} and cannot change state")
            }
            Self::AlreadyMigrated(day_id) => {
                write!(f, "day {day_id} has already been migrated")
            }
            Self::TargetAlreadyImported(day_id) => {
                write!(f, "day {day_id} has already received a migration")
            }
            Self::SameDayMigration(day_id) => {
                write!(f, "day {day_id} cannot be migrated onto itself")
            }
            Self::DuplicateDeferredCopies { item_id, copies } => write!(
                f,
                "found {copies} deferred copies of item {item_id}, expected at most one"
            ),
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::Forbidden { user_id } => {
                write!(f, "entity does not belong to user {user_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Runs `op` inside one immediate transaction and commits on success.
///
/// Dropping the uncommitted transaction on error rolls everything back.
pub(crate) fn with_transaction<T>(
    conn: &Connection,
    op: impl FnOnce(&Store<'_>) -> ServiceResult<T>,
) -> ServiceResult<T> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = op(&Store::new(&tx))?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn ensure_owner(user_id: i64, owner_user_id: i64) -> ServiceResult<()> {
    if user_id != owner_user_id {
        return Err(ServiceError::Forbidden { user_id });
    }
    Ok(())
}

pub(crate) fn normalize_title(value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
