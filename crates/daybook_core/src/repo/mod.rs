//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories never open transactions; callers own transaction scope.

use crate::db::DbError;
use crate::model::item::ItemValidationError;
use crate::model::reference::EntityRef;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection_repo;
pub mod day_repo;
pub mod entry_repo;
pub mod item_repo;
pub mod user_repo;

use collection_repo::SqliteCollectionRepository;
use day_repo::SqliteDayRepository;
use entry_repo::SqliteEntryRepository;
use item_repo::SqliteItemRepository;
use user_repo::SqliteUserRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    NotFound(EntityRef),
    UserNotFound(i64),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(reference) => write!(f, "entity not found: {reference}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::UserNotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// All repositories bound to one connection or transaction.
pub struct Store<'conn> {
    pub users: SqliteUserRepository<'conn>,
    pub days: SqliteDayRepository<'conn>,
    pub items: SqliteItemRepository<'conn>,
    pub entries: SqliteEntryRepository<'conn>,
    pub collections: SqliteCollectionRepository<'conn>,
}

impl<'conn> Store<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            users: SqliteUserRepository::new(conn),
            days: SqliteDayRepository::new(conn),
            items: SqliteItemRepository::new(conn),
            entries: SqliteEntryRepository::new(conn),
            collections: SqliteCollectionRepository::new(conn),
        }
    }
}

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(value: &str, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    value: &str,
    column: &'static str,
) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in {column}: {err}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T, column: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

/// Maps a foreign key failure on `user_id` to `UserNotFound`.
pub(crate) fn map_user_fk(err: rusqlite::Error, user_id: i64) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            RepoError::UserNotFound(user_id)
        }
        _ => RepoError::from(err),
    }
}
