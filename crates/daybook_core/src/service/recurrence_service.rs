//! Recurring item scheduling.
//!
//! # Responsibility
//! - Create the next occurrence when a recurring item is completed.
//! - Remove that occurrence, and any occurrence scheduled from it, when the
//!   completion is undone.
//!
//! # Invariants
//! - A completed item links to at most one next occurrence.
//! - The next occurrence is a fresh `todo` item with no provenance link.

use crate::config::UserConfig;
use crate::model::item::{ItemRecord, NewItem};
use crate::model::recurrence::next_date;
use crate::model::reference::EntityRef;
use crate::repo::item_repo::ItemRepository;
use crate::repo::Store;
use crate::service::collection_service::{attach, ensure_collection, Placement};
use crate::service::copy_service::delete_subtree;
use crate::service::day_service::resolve_day;
use crate::service::section_service::resolve_placement;
use crate::service::ServiceResult;
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::HashSet;

/// Schedules the next occurrence of `item`, computed from `today`.
///
/// Updates `item.recurring_next_item` in memory; the caller persists `item`.
/// Returns the created item, or `None` when the rule yields no next date.
pub(crate) fn schedule_next_occurrence(
    store: &Store<'_>,
    config: &UserConfig,
    item: &mut ItemRecord,
    today: NaiveDate,
) -> ServiceResult<Option<ItemRecord>> {
    if item.recurring_next_item.is_some() {
        return Ok(None);
    }
    let Some(date) = next_date(item.recurrence_rule.as_deref(), today) else {
        debug!(
            "event=recurrence_schedule module=service status=skip reason=no_next_date item_id={}",
            item.id
        );
        return Ok(None);
    };

    let day = resolve_day(store, config, item.user_id, date)?.day;
    let target: EntityRef = resolve_placement(store, config, item.reference(), &day)?;

    let mut next = NewItem::new(item.user_id, item.title.clone(), item.item_type);
    next.extra_data = item.extra_data.clone();
    next.recurrence_rule = item.recurrence_rule.clone();
    let next = store.items.create_item(&next)?;
    if next.is_section() {
        ensure_collection(store, next.reference())?;
    }
    attach(store, target, next.reference(), Placement::Back)?;

    item.recurring_next_item = Some(next.id);
    info!(
        "event=recurrence_schedule module=service status=ok item_id={} next_item_id={} day_id={}",
        item.id, next.id, day.id
    );
    Ok(Some(next))
}

/// Deletes the scheduled next occurrence of `item` and every occurrence
/// chained after it, then clears the link in memory. Returns the number of
/// entities removed.
pub(crate) fn cancel_next_occurrence(
    store: &Store<'_>,
    item: &mut ItemRecord,
) -> ServiceResult<usize> {
    let Some(next_id) = item.recurring_next_item.take() else {
        return Ok(0);
    };

    let mut chain = Vec::new();
    let mut seen = HashSet::from([item.id]);
    let mut cursor = Some(next_id);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            break;
        }
        let Some(occurrence) = store.items.get_item(id)? else {
            break;
        };
        cursor = occurrence.recurring_next_item;
        chain.push(id);
    }

    let mut removed = 0;
    for id in chain.iter().rev() {
        if store.items.get_item(*id)?.is_some() {
            removed += delete_subtree(store, EntityRef::item(*id))?;
        }
    }
    info!(
        "event=recurrence_cancel module=service status=ok item_id={} next_item_id={} chain_len={} removed={}",
        item.id,
        next_id,
        chain.len(),
        removed
    );
    Ok(removed)
}
