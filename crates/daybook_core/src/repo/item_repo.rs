//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `items` plus provenance lookups.
//!
//! # Invariants
//! - Write paths call `validate()` before SQL mutations.
//! - `extra_data` is stored as JSON text and always read back as an object.

use crate::model::item::{ItemId, ItemRecord, ItemState, ItemType, NewItem};
use crate::model::reference::EntityRef;
use crate::repo::{
    date_to_db, map_user_fk, now_ms, parse_date, parse_json, to_json, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    item_type,
    state,
    done_at,
    dropped_at,
    deferred_at,
    deferred_to,
    source_item_id,
    recurring_next_item_id,
    extra_data,
    recurrence_rule,
    created_at,
    updated_at
FROM items";

pub trait ItemRepository {
    fn create_item(&self, item: &NewItem) -> RepoResult<ItemRecord>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<ItemRecord>>;
    fn update_item(&self, item: &ItemRecord) -> RepoResult<()>;
    fn delete_item(&self, id: ItemId) -> RepoResult<()>;
    /// Items copied from `source`, oldest first.
    fn list_copies_of(&self, source: ItemId) -> RepoResult<Vec<ItemRecord>>;
}

pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn require(&self, id: ItemId) -> RepoResult<ItemRecord> {
        self.get_item(id)?
            .ok_or(RepoError::NotFound(EntityRef::item(id)))
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &NewItem) -> RepoResult<ItemRecord> {
        item.validate()?;

        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO items (
                    user_id,
                    title,
                    item_type,
                    state,
                    source_item_id,
                    extra_data,
                    recurrence_rule,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
                params![
                    item.user_id,
                    item.title.as_str(),
                    item.item_type.as_str(),
                    item.state.as_str(),
                    item.source_item,
                    to_json(&item.extra_data, "items.extra_data")?,
                    item.recurrence_rule.as_deref(),
                    now,
                ],
            )
            .map_err(|err| map_user_fk(err, item.user_id))?;

        self.require(self.conn.last_insert_rowid())
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<ItemRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn update_item(&self, item: &ItemRecord) -> RepoResult<()> {
        item.validate()?;

        let changed = self.conn.execute(
            "UPDATE items
             SET
                title = ?2,
                item_type = ?3,
                state = ?4,
                done_at = ?5,
                dropped_at = ?6,
                deferred_at = ?7,
                deferred_to = ?8,
                source_item_id = ?9,
                recurring_next_item_id = ?10,
                extra_data = ?11,
                recurrence_rule = ?12,
                updated_at = ?13
             WHERE id = ?1;",
            params![
                item.id,
                item.title.as_str(),
                item.item_type.as_str(),
                item.state.as_str(),
                item.done_at,
                item.dropped_at,
                item.deferred_at,
                item.deferred_to.map(date_to_db),
                item.source_item,
                item.recurring_next_item,
                to_json(&item.extra_data, "items.extra_data")?,
                item.recurrence_rule.as_deref(),
                now_ms(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(item.reference()));
        }
        Ok(())
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM items WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::item(id)));
        }
        Ok(())
    }

    fn list_copies_of(&self, source: ItemId) -> RepoResult<Vec<ItemRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} WHERE source_item_id = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([source])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<ItemRecord> {
    let type_text: String = row.get("item_type")?;
    let item_type = ItemType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item type `{type_text}` in items.item_type"))
    })?;

    let state_text: String = row.get("state")?;
    let state = ItemState::parse(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item state `{state_text}` in items.state"))
    })?;

    let deferred_to = row
        .get::<_, Option<String>>("deferred_to")?
        .map(|value| parse_date(&value, "items.deferred_to"))
        .transpose()?;

    let extra_text: String = row.get("extra_data")?;
    let extra_data: serde_json::Value = parse_json(&extra_text, "items.extra_data")?;

    let item = ItemRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        item_type,
        state,
        done_at: row.get("done_at")?,
        dropped_at: row.get("dropped_at")?,
        deferred_at: row.get("deferred_at")?,
        deferred_to,
        source_item: row.get("source_item_id")?,
        recurring_next_item: row.get("recurring_next_item_id")?,
        extra_data,
        recurrence_rule: row.get("recurrence_rule")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    item.validate()?;
    Ok(item)
}
