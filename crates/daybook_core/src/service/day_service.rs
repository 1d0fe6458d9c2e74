//! Day use-case service.
//!
//! # Responsibility
//! - Find or create the day for a date, reconciling permanent sections only
//!   on creation.
//! - Close and reopen days.
//!
//! # Invariants
//! - Reopening a closed day never adds permanent sections.
//! - Every day owns a persisted collection once created.

use crate::config::UserConfig;
use crate::model::day::{DayId, DayRecord, DayState};
use crate::repo::day_repo::DayRepository;
use crate::repo::Store;
use crate::service::collection_service::ensure_collection;
use crate::service::section_service::reconcile_sections;
use crate::service::{ensure_owner, with_transaction, ServiceResult};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;

/// Result of a find-or-create lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDay {
    pub day: DayRecord,
    pub created: bool,
    /// Permanent sections added because the day was created.
    pub sections_added: usize,
}

/// Day service facade.
pub struct DayService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> DayService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find_or_create(&self, user_id: i64, date: NaiveDate) -> ServiceResult<ResolvedDay> {
        with_transaction(self.conn, |store| {
            let user = store.users.require(user_id)?;
            resolve_day(store, &user.config, user_id, date)
        })
    }

    pub fn find_day(&self, user_id: i64, date: NaiveDate) -> ServiceResult<Option<DayRecord>> {
        Ok(Store::new(self.conn).days.find_day(user_id, date)?)
    }

    pub fn get_day(&self, day_id: DayId) -> ServiceResult<Option<DayRecord>> {
        Ok(Store::new(self.conn).days.get_day(day_id)?)
    }

    pub fn close_day(&self, user_id: i64, day_id: DayId) -> ServiceResult<DayRecord> {
        self.transition(user_id, day_id, DayState::Closed)
    }

    pub fn reopen_day(&self, user_id: i64, day_id: DayId) -> ServiceResult<DayRecord> {
        self.transition(user_id, day_id, DayState::Open)
    }

    fn transition(&self, user_id: i64, day_id: DayId, state: DayState) -> ServiceResult<DayRecord> {
        with_transaction(self.conn, |store| {
            let day = store.days.require(day_id)?;
            ensure_owner(user_id, day.user_id)?;
            if day.state == state {
                return Ok(day);
            }
            store.days.set_state(day_id, state)?;
            info!(
                "event=day_state module=service status=ok day_id={} state={}",
                day_id, state
            );
            Ok(store.days.require(day_id)?)
        })
    }
}

/// Finds the user's day for `date`, creating and reconciling it when missing.
pub(crate) fn resolve_day(
    store: &Store<'_>,
    config: &UserConfig,
    user_id: i64,
    date: NaiveDate,
) -> ServiceResult<ResolvedDay> {
    if let Some(day) = store.days.find_day(user_id, date)? {
        return Ok(ResolvedDay {
            day,
            created: false,
            sections_added: 0,
        });
    }

    let day = store.days.create_day(user_id, date)?;
    ensure_collection(store, day.reference())?;
    let sections_added = reconcile_sections(store, &day, config)?;
    info!(
        "event=day_create module=service status=ok day_id={} sections_added={}",
        day.id, sections_added
    );
    Ok(ResolvedDay {
        day,
        created: true,
        sections_added,
    })
}
