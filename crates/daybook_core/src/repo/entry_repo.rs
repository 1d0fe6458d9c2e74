//! Persistence for notes, links, lists and journal records.

use crate::model::entry::{EntryKind, EntryRecord, NewEntry};
use crate::model::reference::{EntityId, EntityRef};
use crate::repo::{map_user_fk, now_ms, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

pub trait EntryRepository {
    fn create_entry(&self, entry: &NewEntry) -> RepoResult<EntryRecord>;
    /// Loads an entry only when its stored kind matches `kind`.
    fn get_entry(&self, kind: EntryKind, id: EntityId) -> RepoResult<Option<EntryRecord>>;
    fn delete_entry(&self, kind: EntryKind, id: EntityId) -> RepoResult<()>;
}

pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn require(&self, kind: EntryKind, id: EntityId) -> RepoResult<EntryRecord> {
        self.get_entry(kind, id)?
            .ok_or(RepoError::NotFound(EntityRef::new(kind.entity_kind(), id)))
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create_entry(&self, entry: &NewEntry) -> RepoResult<EntryRecord> {
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO entries (kind, user_id, title, body, url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
                params![
                    entry.kind.as_str(),
                    entry.user_id,
                    entry.title.as_str(),
                    entry.body.as_deref(),
                    entry.url.as_deref(),
                    now,
                ],
            )
            .map_err(|err| map_user_fk(err, entry.user_id))?;
        self.require(entry.kind, self.conn.last_insert_rowid())
    }

    fn get_entry(&self, kind: EntryKind, id: EntityId) -> RepoResult<Option<EntryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, user_id, title, body, url, created_at, updated_at
             FROM entries
             WHERE id = ?1 AND kind = ?2;",
        )?;
        let mut rows = stmt.query(params![id, kind.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn delete_entry(&self, kind: EntryKind, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM entries WHERE id = ?1 AND kind = ?2;",
            params![id, kind.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::new(kind.entity_kind(), id)));
        }
        Ok(())
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<EntryRecord> {
    let kind_text: String = row.get("kind")?;
    let kind = EntryKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid entry kind `{kind_text}` in entries.kind"))
    })?;
    Ok(EntryRecord {
        id: row.get("id")?,
        kind,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        url: row.get("url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
