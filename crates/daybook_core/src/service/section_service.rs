//! Permanent section reconciliation.
//!
//! # Responsibility
//! - Ensure every configured permanent section exists at a day root.
//! - Resolve the same-named section on another day for placements.
//!
//! # Invariants
//! - Title matching is case-insensitive and whitespace-collapsed.
//! - Existing sections are never renamed, reordered or duplicated.
//! - Reconciling twice with the same configuration adds nothing the second
//!   time.

use crate::config::{section_key, UserConfig};
use crate::model::day::{DayId, DayRecord};
use crate::model::item::{ItemRecord, NewItem};
use crate::model::reference::{EntityKind, EntityRef};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::Store;
use crate::service::collection_service::{attach, ensure_collection, Placement};
use crate::service::{ensure_owner, with_transaction, ServiceResult};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub sections_added: usize,
}

/// Permanent section service facade.
pub struct SectionService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SectionService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates any configured section missing from the day's root.
    pub fn reconcile(&self, user_id: i64, day_id: DayId) -> ServiceResult<ReconcileOutcome> {
        let outcome = with_transaction(self.conn, |store| {
            let user = store.users.require(user_id)?;
            let day = store.days.require(day_id)?;
            ensure_owner(user_id, day.user_id)?;
            let sections_added = reconcile_sections(store, &day, &user.config)?;
            Ok(ReconcileOutcome { sections_added })
        });

        match &outcome {
            Ok(result) => info!(
                "event=sections_reconcile module=service status=ok day_id={} sections_added={}",
                day_id, result.sections_added
            ),
            Err(err) => warn!(
                "event=sections_reconcile module=service status=error day_id={} error={}",
                day_id, err
            ),
        }
        outcome
    }
}

/// Appends missing permanent sections to `day`'s root. Returns the count added.
pub(crate) fn reconcile_sections(
    store: &Store<'_>,
    day: &DayRecord,
    config: &UserConfig,
) -> ServiceResult<usize> {
    let day_ref = day.reference();
    let mut collection = store.collections.get_or_new(day_ref)?;

    let mut existing: HashSet<String> = root_sections(store, day_ref)?
        .iter()
        .map(|section| section_key(&section.title))
        .collect();

    let mut added = 0;
    for title in &config.permanent_sections {
        let title = title.trim();
        if title.is_empty() || !existing.insert(section_key(title)) {
            continue;
        }
        let section = store
            .items
            .create_item(&NewItem::permanent_section(day.user_id, title))?;
        ensure_collection(store, section.reference())?;
        collection.add_active(section.reference());
        added += 1;
    }

    store.collections.save_collection(&mut collection)?;
    Ok(added)
}

/// Section items in the active root list of `owner`, in order.
pub(crate) fn root_sections(store: &Store<'_>, owner: EntityRef) -> ServiceResult<Vec<ItemRecord>> {
    let Some(collection) = store.collections.get_collection(owner)? else {
        return Ok(Vec::new());
    };
    let mut sections = Vec::new();
    for reference in collection.active() {
        if reference.kind != EntityKind::Item {
            continue;
        }
        if let Some(item) = store.items.get_item(reference.id)? {
            if item.is_section() {
                sections.push(item);
            }
        }
    }
    Ok(sections)
}

/// First root section of `day` whose title matches `title`.
pub(crate) fn find_root_section(
    store: &Store<'_>,
    day: &DayRecord,
    title: &str,
) -> ServiceResult<Option<ItemRecord>> {
    let key = section_key(title);
    Ok(root_sections(store, day.reference())?
        .into_iter()
        .find(|section| section_key(&section.title) == key))
}

/// Finds the same-named root section on `day`, creating a permanent one at
/// the end of the root when missing.
pub(crate) fn find_or_create_root_section(
    store: &Store<'_>,
    day: &DayRecord,
    title: &str,
) -> ServiceResult<ItemRecord> {
    if let Some(section) = find_root_section(store, day, title)? {
        return Ok(section);
    }
    let section = store
        .items
        .create_item(&NewItem::permanent_section(day.user_id, title.trim()))?;
    ensure_collection(store, section.reference())?;
    attach(store, day.reference(), section.reference(), Placement::Back)?;
    Ok(section)
}

/// Where a copy of `item` belongs on `target_day`.
///
/// When the item currently sits inside a section whose title is one of the
/// user's permanent sections, the copy goes into the same-named section on
/// the target day; otherwise it goes to the target day root.
pub(crate) fn resolve_placement(
    store: &Store<'_>,
    config: &UserConfig,
    item: EntityRef,
    target_day: &DayRecord,
) -> ServiceResult<EntityRef> {
    let Some(parent) = store.collections.find_owner_of(item)? else {
        return Ok(target_day.reference());
    };
    if parent.owner.kind != EntityKind::Item {
        return Ok(target_day.reference());
    }
    let Some(parent_item) = store.items.get_item(parent.owner.id)? else {
        return Ok(target_day.reference());
    };
    if !parent_item.is_section() {
        return Ok(target_day.reference());
    }
    match config.permanent_section_title(&parent_item.title) {
        Some(title) => Ok(find_or_create_root_section(store, target_day, title)?.reference()),
        None => Ok(target_day.reference()),
    }
}
