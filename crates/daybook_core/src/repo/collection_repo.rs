//! Ordered collection repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist `OrderedCollection` lists in the `[{"Item": 1}]` JSON shape.
//! - Maintain the `collection_members` reverse index used by
//!   `find_owner_of`.
//!
//! # Invariants
//! - At most one collection per `(owner_type, owner_id)`.
//! - `collection_members` mirrors the JSON lists after every `save`.

use crate::model::collection::{CollectionId, OrderedCollection};
use crate::model::reference::{EntityKind, EntityRef};
use crate::repo::{now_ms, parse_json, to_json, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLLECTION_SELECT_SQL: &str = "SELECT
    c.id AS id,
    c.owner_type AS owner_type,
    c.owner_id AS owner_id,
    c.active_items AS active_items,
    c.inactive_items AS inactive_items
FROM collections c";

pub trait CollectionRepository {
    fn get_collection(&self, owner: EntityRef) -> RepoResult<Option<OrderedCollection>>;
    /// Writes both lists and refreshes the reverse index. Assigns `id` on
    /// first save.
    fn save_collection(&self, collection: &mut OrderedCollection) -> RepoResult<CollectionId>;
    fn delete_collection(&self, owner: EntityRef) -> RepoResult<()>;
    /// Collection whose active or inactive list holds `member`.
    fn find_owner_of(&self, member: EntityRef) -> RepoResult<Option<OrderedCollection>>;
}

pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads the owner's collection, or an unsaved empty one.
    pub fn get_or_new(&self, owner: EntityRef) -> RepoResult<OrderedCollection> {
        Ok(self
            .get_collection(owner)?
            .unwrap_or_else(|| OrderedCollection::new(owner)))
    }

    fn write_members(&self, collection_id: CollectionId, collection: &OrderedCollection) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM collection_members WHERE collection_id = ?1;",
            [collection_id],
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO collection_members (collection_id, member_type, member_id, list, position)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        let lists = [("active", collection.active()), ("inactive", collection.inactive())];
        for (list, members) in lists {
            for (position, member) in members.iter().enumerate() {
                stmt.execute(params![
                    collection_id,
                    member.kind.as_str(),
                    member.id,
                    list,
                    position as i64,
                ])?;
            }
        }
        Ok(())
    }
}

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn get_collection(&self, owner: EntityRef) -> RepoResult<Option<OrderedCollection>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COLLECTION_SELECT_SQL} WHERE c.owner_type = ?1 AND c.owner_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![owner.kind.as_str(), owner.id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_collection_row(row)?));
        }
        Ok(None)
    }

    fn save_collection(&self, collection: &mut OrderedCollection) -> RepoResult<CollectionId> {
        if !collection.owner.kind.is_container() {
            return Err(RepoError::InvalidData(format!(
                "{} cannot own a collection",
                collection.owner
            )));
        }
        let active = to_json(&collection.active(), "collections.active_items")?;
        let inactive = to_json(&collection.inactive(), "collections.inactive_items")?;
        let now = now_ms();

        self.conn.execute(
            "INSERT INTO collections (owner_type, owner_id, active_items, inactive_items, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (owner_type, owner_id) DO UPDATE SET
                active_items = excluded.active_items,
                inactive_items = excluded.inactive_items,
                updated_at = excluded.updated_at;",
            params![
                collection.owner.kind.as_str(),
                collection.owner.id,
                active,
                inactive,
                now,
            ],
        )?;

        let collection_id: CollectionId = self.conn.query_row(
            "SELECT id FROM collections WHERE owner_type = ?1 AND owner_id = ?2;",
            params![collection.owner.kind.as_str(), collection.owner.id],
            |row| row.get(0),
        )?;
        self.write_members(collection_id, collection)?;
        collection.id = Some(collection_id);
        Ok(collection_id)
    }

    fn delete_collection(&self, owner: EntityRef) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM collections WHERE owner_type = ?1 AND owner_id = ?2;",
            params![owner.kind.as_str(), owner.id],
        )?;
        Ok(())
    }

    fn find_owner_of(&self, member: EntityRef) -> RepoResult<Option<OrderedCollection>> {
        let collection_id: Option<CollectionId> = self
            .conn
            .query_row(
                "SELECT collection_id
                 FROM collection_members
                 WHERE member_type = ?1 AND member_id = ?2
                 ORDER BY collection_id ASC
                 LIMIT 1;",
                params![member.kind.as_str(), member.id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(collection_id) = collection_id else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare(&format!("{COLLECTION_SELECT_SQL} WHERE c.id = ?1;"))?;
        let mut rows = stmt.query([collection_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_collection_row(row)?));
        }
        Err(RepoError::InvalidData(format!(
            "collection_members points at missing collection {collection_id}"
        )))
    }
}

fn parse_collection_row(row: &Row<'_>) -> RepoResult<OrderedCollection> {
    let owner_type: String = row.get("owner_type")?;
    let kind = EntityKind::parse(&owner_type).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid owner type `{owner_type}` in collections.owner_type"
        ))
    })?;
    if !kind.is_container() {
        return Err(RepoError::InvalidData(format!(
            "`{owner_type}` cannot own a collection"
        )));
    }

    let active_text: String = row.get("active_items")?;
    let inactive_text: String = row.get("inactive_items")?;
    Ok(OrderedCollection::from_parts(
        Some(row.get("id")?),
        EntityRef::new(kind, row.get("owner_id")?),
        parse_json(&active_text, "collections.active_items")?,
        parse_json(&inactive_text, "collections.inactive_items")?,
    ))
}
