//! Day repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Import links are only written while still `NULL`; a second write is
//!   reported as `InvalidData` instead of overwriting.

use crate::model::day::{DayId, DayRecord, DayState};
use crate::model::reference::EntityRef;
use crate::repo::{date_to_db, map_user_fk, now_ms, parse_date, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const DAY_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    date,
    state,
    closed_at,
    reopened_at,
    imported_from_day_id,
    imported_to_day_id,
    imported_at,
    created_at,
    updated_at
FROM days";

pub trait DayRepository {
    fn create_day(&self, user_id: i64, date: NaiveDate) -> RepoResult<DayRecord>;
    fn get_day(&self, id: DayId) -> RepoResult<Option<DayRecord>>;
    fn find_day(&self, user_id: i64, date: NaiveDate) -> RepoResult<Option<DayRecord>>;
    fn set_state(&self, id: DayId, state: DayState) -> RepoResult<()>;
    /// Links `source -> target` on both rows, stamping `imported_at`.
    fn link_import(&self, source: DayId, target: DayId) -> RepoResult<()>;
}

pub struct SqliteDayRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDayRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn require(&self, id: DayId) -> RepoResult<DayRecord> {
        self.get_day(id)?
            .ok_or(RepoError::NotFound(EntityRef::day(id)))
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Option<DayRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_day_row(row)?));
        }
        Ok(None)
    }
}

impl DayRepository for SqliteDayRepository<'_> {
    fn create_day(&self, user_id: i64, date: NaiveDate) -> RepoResult<DayRecord> {
        self.conn
            .execute(
                "INSERT INTO days (user_id, date, state) VALUES (?1, ?2, 'open');",
                params![user_id, date_to_db(date)],
            )
            .map_err(|err| map_user_fk(err, user_id))?;
        self.require(self.conn.last_insert_rowid())
    }

    fn get_day(&self, id: DayId) -> RepoResult<Option<DayRecord>> {
        self.query_one(&format!("{DAY_SELECT_SQL} WHERE id = ?1;"), [id])
    }

    fn find_day(&self, user_id: i64, date: NaiveDate) -> RepoResult<Option<DayRecord>> {
        self.query_one(
            &format!("{DAY_SELECT_SQL} WHERE user_id = ?1 AND date = ?2;"),
            params![user_id, date_to_db(date)],
        )
    }

    fn set_state(&self, id: DayId, state: DayState) -> RepoResult<()> {
        let stamp_column = match state {
            DayState::Closed => "closed_at",
            DayState::Open => "reopened_at",
        };
        let changed = self.conn.execute(
            &format!(
                "UPDATE days
                 SET state = ?2,
                     {stamp_column} = ?3,
                     updated_at = ?3
                 WHERE id = ?1;"
            ),
            params![id, state.as_str(), now_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::day(id)));
        }
        Ok(())
    }

    fn link_import(&self, source: DayId, target: DayId) -> RepoResult<()> {
        let now = now_ms();
        let changed = self.conn.execute(
            "UPDATE days
             SET imported_to_day_id = ?2,
                 imported_at = ?3,
                 updated_at = ?3
             WHERE id = ?1
               AND imported_to_day_id IS NULL;",
            params![source, target, now],
        )?;
        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "day {source} already has an imported_to link"
            )));
        }

        let changed = self.conn.execute(
            "UPDATE days
             SET imported_from_day_id = ?2,
                 imported_at = ?3,
                 updated_at = ?3
             WHERE id = ?1
               AND imported_from_day_id IS NULL;",
            params![target, source, now],
        )?;
        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "day {target} already has an imported_from link"
            )));
        }
        Ok(())
    }
}

fn parse_day_row(row: &Row<'_>) -> RepoResult<DayRecord> {
    let date_text: String = row.get("date")?;
    let state_text: String = row.get("state")?;
    let state = DayState::parse(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid day state `{state_text}` in days.state"))
    })?;

    Ok(DayRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: parse_date(&date_text, "days.date")?,
        state,
        closed_at: row.get("closed_at")?,
        reopened_at: row.get("reopened_at")?,
        imported_from: row.get("imported_from_day_id")?,
        imported_to: row.get("imported_to_day_id")?,
        imported_at: row.get("imported_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
