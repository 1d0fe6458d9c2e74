//! Defer and undefer of todo items.
//!
//! # Responsibility
//! - Copy an item subtree onto a later day and park the original as
//!   `deferred`.
//! - Reverse a deferral by deleting the copy and restoring the original.
//!
//! # Invariants
//! - Only `todo` items of non-locked types can be deferred.
//! - A deferred item has exactly one live copy on its `deferred_to` day;
//!   more than one is reported, never silently resolved.
//! - Undefer leaves no trace of the copy subtree in any collection.

use crate::model::day::{DayId, DayRecord};
use crate::model::item::{ItemId, ItemRecord, ItemState};
use crate::model::reference::{EntityKind, EntityRef};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::day_repo::DayRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::{now_ms, RepoError, Store};
use crate::service::collection_service::{set_membership, Placement};
use crate::service::copy_service::{apply_plan, delete_subtree, plan_subtree};
use crate::service::day_service::resolve_day;
use crate::service::section_service::resolve_placement;
use crate::service::{ensure_owner, with_transaction, ServiceError, ServiceResult};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferOutcome {
    pub new_item: ItemRecord,
    pub target_day: DayRecord,
    /// Items copied below the deferred item.
    pub nested_items_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndeferOutcome {
    pub item: ItemRecord,
    /// Entities removed with the deferred copy; zero when no copy was found.
    pub removed_entities: usize,
}

/// Defer service facade.
pub struct DeferService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> DeferService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn defer_item(
        &self,
        user_id: i64,
        item_id: ItemId,
        target_date: NaiveDate,
    ) -> ServiceResult<DeferOutcome> {
        let outcome = with_transaction(self.conn, |store| {
            defer(store, user_id, item_id, target_date)
        });

        match &outcome {
            Ok(result) => info!(
                "event=item_defer module=service status=ok item_id={} new_item_id={} target_day_id={} nested_items_count={}",
                item_id, result.new_item.id, result.target_day.id, result.nested_items_count
            ),
            Err(err) => warn!(
                "event=item_defer module=service status=error item_id={} error={}",
                item_id, err
            ),
        }
        outcome
    }

    pub fn undefer_item(&self, user_id: i64, item_id: ItemId) -> ServiceResult<UndeferOutcome> {
        let outcome = with_transaction(self.conn, |store| undefer(store, user_id, item_id));

        match &outcome {
            Ok(result) => info!(
                "event=item_undefer module=service status=ok item_id={} removed_entities={}",
                item_id, result.removed_entities
            ),
            Err(err) => warn!(
                "event=item_undefer module=service status=error item_id={} error={}",
                item_id, err
            ),
        }
        outcome
    }
}

fn defer(
    store: &Store<'_>,
    user_id: i64,
    item_id: ItemId,
    target_date: NaiveDate,
) -> ServiceResult<DeferOutcome> {
    let user = store.users.require(user_id)?;
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

    let target_day = resolve_day(store, &user.config, user_id, target_date)?.day;
    let target_owner = resolve_placement(store, &user.config, item.reference(), &target_day)?;

    let copy_settings = user.config.settings.copy_settings();
    let plan = plan_subtree(store, item.reference(), &copy_settings)?.ok_or_else(|| {
        RepoError::InvalidData(format!("{} produced an empty copy plan", item.reference()))
    })?;
    let new_ref = apply_plan(store, &plan, target_owner, user_id, Placement::Back)?;
    let new_item = store.items.require(new_ref.id)?;

    item.state = ItemState::Deferred;
    item.deferred_at = Some(now_ms());
    item.deferred_to = Some(target_date);
    store.items.update_item(&item)?;
    set_membership(store, item.reference(), false)?;

    Ok(DeferOutcome {
        new_item,
        target_day,
        nested_items_count: plan.nested_item_count(),
    })
}

fn undefer(store: &Store<'_>, user_id: i64, item_id: ItemId) -> ServiceResult<UndeferOutcome> {
    let mut item = store.items.require(item_id)?;
    ensure_owner(user_id, item.user_id)?;
    if item.state != ItemState::Deferred {
        return Err(ServiceError::InvalidState {
            item_id,
            expected: ItemState::Deferred,
            actual: item.state,
        });
    }

    let copies = deferred_copies(store, &item)?;
    let removed_entities = match copies.as_slice() {
        [] => {
            warn!(
                "event=item_undefer module=service status=warn reason=copy_missing item_id={}",
                item_id
            );
            0
        }
        [copy] => delete_subtree(store, copy.reference())?,
        _ => {
            return Err(ServiceError::DuplicateDeferredCopies {
                item_id,
                copies: copies.len(),
            })
        }
    };

    item.state = ItemState::Todo;
    item.deferred_at = None;
    item.deferred_to = None;
    store.items.update_item(&item)?;
    set_membership(store, item.reference(), true)?;

    Ok(UndeferOutcome {
        item: store.items.require(item_id)?,
        removed_entities,
    })
}

/// Copies of `item` whose ancestor chain ends at its `deferred_to` day.
fn deferred_copies(store: &Store<'_>, item: &ItemRecord) -> ServiceResult<Vec<ItemRecord>> {
    let Some(date) = item.deferred_to else {
        return Ok(Vec::new());
    };
    let Some(day) = store.days.find_day(item.user_id, date)? else {
        return Ok(Vec::new());
    };

    let mut copies = Vec::new();
    for copy in store.items.list_copies_of(item.id)? {
        if root_day_of(store, copy.reference())? == Some(day.id) {
            copies.push(copy);
        }
    }
    Ok(copies)
}

/// Day at the top of `node`'s ancestor chain, if it is attached to one.
fn root_day_of(store: &Store<'_>, node: EntityRef) -> ServiceResult<Option<DayId>> {
    let mut seen = HashSet::from([node]);
    let mut current = node;
    while let Some(parent) = store.collections.find_owner_of(current)? {
        if parent.owner.kind == EntityKind::Day {
            return Ok(Some(parent.owner.id));
        }
        if !seen.insert(parent.owner) {
            return Err(RepoError::InvalidData(format!(
                "collection cycle detected at {}",
                parent.owner
            ))
            .into());
        }
        current = parent.owner;
    }
    Ok(None)
}
