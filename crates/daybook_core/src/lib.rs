//! Core domain logic for the daybook planner.
//! This crate is the single source of truth for collection, migration,
//! deferral and recurrence invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CopySettings, ItemCopySettings, MigrationSettings, UserConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::collection::{CollectionSnapshot, OrderedCollection};
pub use model::day::{DayId, DayRecord, DayState};
pub use model::entry::{EntryKind, EntryRecord, NewEntry};
pub use model::item::{ItemId, ItemRecord, ItemState, ItemType, NewItem};
pub use model::recurrence::{next_date, Frequency, RecurrenceRule};
pub use model::reference::{EntityKind, EntityRef};
pub use repo::{RepoError, RepoResult};
pub use service::collection_service::{CollectionService, Placement};
pub use service::copy_service::{CopyOutcome, CopyService};
pub use service::day_service::{DayService, ResolvedDay};
pub use service::defer_service::{DeferOutcome, DeferService, UndeferOutcome};
pub use service::item_service::ItemService;
pub use service::migration_service::{MigrationOutcome, MigrationService};
pub use service::section_service::{ReconcileOutcome, SectionService};
pub use service::user_service::UserService;
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
