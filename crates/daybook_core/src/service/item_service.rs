//! Item and entry use-case service.
//!
//! # Responsibility
//! - Create items and entries inside any container.
//! - Drive item state transitions and keep the parent collection in sync.
//! - Hook recurrence scheduling into completion and restore.
//!
//! # Invariants
//! - `todo` items sit in their parent's active list; every other state sits
//!   in the inactive list.
//! - Deferred items only return to `todo` through undefer.
//! - Deleting removes the whole subtree and its collections.

use crate::model::entry::{EntryKind, EntryRecord, NewEntry};
use crate::model::item::{ItemId, ItemRecord, ItemState, ItemType, NewItem};
use crate::model::reference::{EntityKind, EntityRef};
use crate::repo::entry_repo::EntryRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::{now_ms, RepoError, Store};
use crate::service::collection_service::{attach, ensure_collection, set_membership, Placement};
use crate::service::copy_service::delete_subtree;
use crate::service::recurrence_service::{cancel_next_occurrence, schedule_next_occurrence};
use crate::service::{ensure_owner, normalize_title, with_transaction, ServiceError, ServiceResult};
use chrono::{Local, NaiveDate};
use log::{info, warn};
use rusqlite::Connection;
use serde_json::Value;

/// Item service facade.
pub struct ItemService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ItemService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates a `todo` item inside `owner`.
    pub fn create_item(
        &self,
        user_id: i64,
        owner: EntityRef,
        title: &str,
        item_type: ItemType,
        placement: Placement,
    ) -> ServiceResult<ItemRecord> {
        let title = normalize_title(title)?;
        let item = with_transaction(self.conn, |store| {
            require_container(store, user_id, owner)?;
            let item = store
                .items
                .create_item(&NewItem::new(user_id, title, item_type))?;
            if item.is_section() {
                ensure_collection(store, item.reference())?;
            }
            attach(store, owner, item.reference(), placement)?;
            Ok(item)
        })?;

        info!(
            "event=item_create module=service status=ok item_id={} item_type={} owner={}",
            item.id, item.item_type, owner
        );
        Ok(item)
    }

    /// Creates an entry (note, link, list, journal record) inside `owner`.
    pub fn create_entry(
        &self,
        owner: EntityRef,
        entry: &NewEntry,
        placement: Placement,
    ) -> ServiceResult<EntryRecord> {
        let record = with_transaction(self.conn, |store| {
            require_container(store, entry.user_id, owner)?;
            let record = store.entries.create_entry(entry)?;
            if record.kind.entity_kind().is_container() {
                ensure_collection(store, record.reference())?;
            }
            attach(store, owner, record.reference(), placement)?;
            Ok(record)
        })?;

        info!(
            "event=entry_create module=service status=ok entry={} owner={}",
            record.reference(),
            owner
        );
        Ok(record)
    }

    pub fn add_note(&self, user_id: i64, owner: EntityRef, body: &str) -> ServiceResult<EntryRecord> {
        self.create_entry(owner, &NewEntry::note(user_id, body), Placement::Back)
    }

    pub fn add_link(
        &self,
        user_id: i64,
        owner: EntityRef,
        title: &str,
        url: &str,
    ) -> ServiceResult<EntryRecord> {
        self.create_entry(owner, &NewEntry::link(user_id, title, url), Placement::Back)
    }

    pub fn get_item(&self, item_id: ItemId) -> ServiceResult<Option<ItemRecord>> {
        Ok(Store::new(self.conn).items.get_item(item_id)?)
    }

    pub fn rename_item(&self, user_id: i64, item_id: ItemId, title: &str) -> ServiceResult<ItemRecord> {
        let title = normalize_title(title)?;
        self.update(user_id, item_id, |item| {
            item.title = title;
            Ok(())
        })
    }

    /// Replaces `extra_data`; must be a JSON object.
    pub fn set_extra_data(
        &self,
        user_id: i64,
        item_id: ItemId,
        extra_data: Value,
    ) -> ServiceResult<ItemRecord> {
        self.update(user_id, item_id, |item| {
            item.extra_data = extra_data;
            Ok(())
        })
    }

    /// Sets or clears the raw JSON recurrence rule.
    pub fn set_recurrence_rule(
        &self,
        user_id: i64,
        item_id: ItemId,
        rule: Option<String>,
    ) -> ServiceResult<ItemRecord> {
        self.update(user_id, item_id, |item| {
            item.recurrence_rule = rule;
            Ok(())
        })
    }

    /// Marks a `todo` item done, scheduling its next occurrence from today.
    pub fn complete_item(&self, user_id: i64, item_id: ItemId) -> ServiceResult<ItemRecord> {
        self.complete_item_on(user_id, item_id, Local::now().date_naive())
    }

    /// Same as [`Self::complete_item`] with an explicit "today".
    pub fn complete_item_on(
        &self,
        user_id: i64,
        item_id: ItemId,
        today: NaiveDate,
    ) -> ServiceResult<ItemRecord> {
        self.transition(user_id, item_id, ItemState::Done, |store, item| {
            let user = store.users.require(user_id)?;
            item.done_at = Some(now_ms());
            schedule_next_occurrence(store, &user.config, item, today)?;
            Ok(())
        })
    }

    pub fn drop_item(&self, user_id: i64, item_id: ItemId) -> ServiceResult<ItemRecord> {
        self.transition(user_id, item_id, ItemState::Dropped, |_, item| {
            item.dropped_at = Some(now_ms());
            Ok(())
        })
    }

    /// Returns a done or dropped item to `todo`, removing any scheduled
    /// next occurrence.
    pub fn restore_item(&self, user_id: i64, item_id: ItemId) -> ServiceResult<ItemRecord> {
        let outcome = with_transaction(self.conn, |store| {
            let mut item = store.items.require(item_id)?;
            ensure_owner(user_id, item.user_id)?;
            if !matches!(item.state, ItemState::Done | ItemState::Dropped) {
                return Err(ServiceError::InvalidState {
                    item_id,
                    expected: ItemState::Done,
                    actual: item.state,
                });
            }
            item.state = ItemState::Todo;
            cancel_next_occurrence(store, &mut item)?;
            store.items.update_item(&item)?;
            set_membership(store, item.reference(), true)?;
            Ok(item)
        });
        log_transition(item_id, ItemState::Todo, &outcome);
        outcome
    }

    /// Deletes an item or entry together with everything below it.
    pub fn delete(&self, user_id: i64, target: EntityRef) -> ServiceResult<usize> {
        let outcome = with_transaction(self.conn, |store| {
            let owner_user = owner_user_of(store, target)?;
            ensure_owner(user_id, owner_user)?;
            delete_subtree(store, target)
        });

        match &outcome {
            Ok(removed) => info!(
                "event=entity_delete module=service status=ok target={} removed={}",
                target, removed
            ),
            Err(err) => warn!(
                "event=entity_delete module=service status=error target={} error={}",
                target, err
            ),
        }
        outcome
    }

    fn update(
        &self,
        user_id: i64,
        item_id: ItemId,
        apply: impl FnOnce(&mut ItemRecord) -> ServiceResult<()>,
    ) -> ServiceResult<ItemRecord> {
        with_transaction(self.conn, |store| {
            let mut item = store.items.require(item_id)?;
            ensure_owner(user_id, item.user_id)?;
            apply(&mut item)?;
            store.items.update_item(&item)?;
            Ok(store.items.require(item_id)?)
        })
    }

    /// Moves a `todo` item into `state`, running `hook` before persisting.
    fn transition(
        &self,
        user_id: i64,
        item_id: ItemId,
        state: ItemState,
        hook: impl FnOnce(&Store<'_>, &mut ItemRecord) -> ServiceResult<()>,
    ) -> ServiceResult<ItemRecord> {
        let outcome = with_transaction(self.conn, |store| {
            let mut item = store.items.require(item_id)?;
            ensure_owner(user_id, item.user_id)?;
            if item.item_type.is_state_locked() {
                return Err(ServiceError::StateLocked {
                    item_id,
                    item_type: item.item_type,
                });
            }
            if item.state != ItemState::Todo {
                return Err(ServiceError::InvalidState {
                    item_id,
                    expected: ItemState::Todo,
                    actual: item.state,
                });
            }
            item.state = state;
            hook(store, &mut item)?;
            store.items.update_item(&item)?;
            set_membership(store, item.reference(), false)?;
            Ok(item)
        });
        log_transition(item_id, state, &outcome);
        outcome
    }
}

fn log_transition(item_id: ItemId, state: ItemState, outcome: &ServiceResult<ItemRecord>) {
    match outcome {
        Ok(item) => info!(
            "event=item_transition module=service status=ok item_id={} state={} next_item_id={}",
            item_id,
            state,
            item.recurring_next_item
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string())
        ),
        Err(err) => warn!(
            "event=item_transition module=service status=error item_id={} state={} error={}",
            item_id, state, err
        ),
    }
}

/// Checks that `owner` is an existing container belonging to `user_id`.
fn require_container(store: &Store<'_>, user_id: i64, owner: EntityRef) -> ServiceResult<()> {
    if !owner.kind.is_container() {
        return Err(RepoError::InvalidData(format!("{owner} cannot hold children")).into());
    }
    let owner_user = owner_user_of(store, owner)?;
    ensure_owner(user_id, owner_user)
}

/// User id stored on the row behind `reference`.
fn owner_user_of(store: &Store<'_>, reference: EntityRef) -> ServiceResult<i64> {
    let user_id = match reference.kind {
        EntityKind::Day => store.days.require(reference.id)?.user_id,
        EntityKind::Item => store.items.require(reference.id)?.user_id,
        kind => {
            let entry_kind =
                EntryKind::from_entity_kind(kind).ok_or(RepoError::NotFound(reference))?;
            store.entries.require(entry_kind, reference.id)?.user_id
        }
    };
    Ok(user_id)
}
