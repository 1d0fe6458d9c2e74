//! Recursive subtree copy and delete.
//!
//! # Responsibility
//! - Plan a filtered copy of a container subtree in memory.
//! - Apply a plan under a target collection, preserving order.
//! - Delete a subtree together with every nested collection.
//!
//! # Invariants
//! - Completable/reusable items are copied only while `todo`, at any depth.
//! - Only `active` child entries are ever copied.
//! - A section whose filtered children are empty is kept only when
//!   `sections_with_no_active_items` is set.
//! - Every clone records its original in `source_item`.

use crate::config::CopySettings;
use crate::model::collection::OrderedCollection;
use crate::model::entry::{EntryKind, EntryRecord, NewEntry};
use crate::model::item::{ItemRecord, ItemState, NewItem};
use crate::model::reference::{EntityKind, EntityRef};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::entry_repo::EntryRepository;
use crate::repo::item_repo::ItemRepository;
use crate::repo::{RepoError, Store};
use crate::service::collection_service::{attach, detach, Placement};
use crate::service::{with_transaction, ServiceResult};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

/// Filtered source tree ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPlan {
    pub source: PlanSource,
    pub children: Vec<CopyPlan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanSource {
    Item(ItemRecord),
    Entry(EntryRecord),
}

impl CopyPlan {
    pub fn source_ref(&self) -> EntityRef {
        match &self.source {
            PlanSource::Item(item) => item.reference(),
            PlanSource::Entry(entry) => entry.reference(),
        }
    }

    /// Items in this plan, root included.
    pub fn item_count(&self) -> usize {
        let own = usize::from(matches!(self.source, PlanSource::Item(_)));
        own + self.children.iter().map(CopyPlan::item_count).sum::<usize>()
    }

    /// Items below the root.
    pub fn nested_item_count(&self) -> usize {
        self.children.iter().map(CopyPlan::item_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    /// Reference of the new root, `None` when the filters excluded it.
    pub new_ref: Option<EntityRef>,
    pub copied_items: usize,
}

/// Subtree copy service facade.
pub struct CopyService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CopyService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Copies `source` and its eligible active subtree to the end of
    /// `target_owner`'s active list, owned by `user_id`.
    pub fn copy_subtree(
        &self,
        user_id: i64,
        source: EntityRef,
        target_owner: EntityRef,
        settings: &CopySettings,
    ) -> ServiceResult<CopyOutcome> {
        let outcome = with_transaction(self.conn, |store| {
            let Some(plan) = plan_subtree(store, source, settings)? else {
                return Ok(CopyOutcome {
                    new_ref: None,
                    copied_items: 0,
                });
            };
            let new_ref = apply_plan(store, &plan, target_owner, user_id, Placement::Back)?;
            Ok(CopyOutcome {
                new_ref: Some(new_ref),
                copied_items: plan.item_count(),
            })
        });

        match &outcome {
            Ok(result) => info!(
                "event=subtree_copy module=service status=ok source={} target={} copied_items={}",
                source, target_owner, result.copied_items
            ),
            Err(err) => warn!(
                "event=subtree_copy module=service status=error source={} target={} error={}",
                source, target_owner, err
            ),
        }
        outcome
    }
}

/// Builds the filtered copy plan rooted at `source`.
///
/// Returns `None` when the root itself is not eligible.
pub(crate) fn plan_subtree(
    store: &Store<'_>,
    source: EntityRef,
    settings: &CopySettings,
) -> ServiceResult<Option<CopyPlan>> {
    let mut visiting = HashSet::new();
    plan_node(store, source, settings, &mut visiting)
}

/// Plans every eligible active child of `owner`, in order.
pub(crate) fn plan_children(
    store: &Store<'_>,
    owner: EntityRef,
    settings: &CopySettings,
) -> ServiceResult<Vec<CopyPlan>> {
    let mut visiting = HashSet::from([owner]);
    plan_active_children(store, owner, settings, &mut visiting)
}

fn plan_node(
    store: &Store<'_>,
    source: EntityRef,
    settings: &CopySettings,
    visiting: &mut HashSet<EntityRef>,
) -> ServiceResult<Option<CopyPlan>> {
    match source.kind {
        EntityKind::Item => {
            let item = store.items.require(source.id)?;
            if item.state != ItemState::Todo {
                return Ok(None);
            }
            if !visiting.insert(source) {
                return Err(RepoError::InvalidData(format!(
                    "collection cycle detected at {source}"
                ))
                .into());
            }
            let children = plan_active_children(store, source, settings, visiting)?;
            visiting.remove(&source);

            if item.is_section() && children.is_empty() && !settings.sections_with_no_active_items {
                debug!(
                    "event=subtree_plan module=service status=skip reason=empty_section source={}",
                    source
                );
                return Ok(None);
            }
            Ok(Some(CopyPlan {
                source: PlanSource::Item(item),
                children,
            }))
        }
        EntityKind::Note if settings.notes => plan_leaf(store, EntryKind::Note, source),
        EntityKind::Link if settings.links => plan_leaf(store, EntryKind::Link, source),
        _ => Ok(None),
    }
}

fn plan_leaf(
    store: &Store<'_>,
    kind: EntryKind,
    source: EntityRef,
) -> ServiceResult<Option<CopyPlan>> {
    let entry = store.entries.require(kind, source.id)?;
    Ok(Some(CopyPlan {
        source: PlanSource::Entry(entry),
        children: Vec::new(),
    }))
}

fn plan_active_children(
    store: &Store<'_>,
    owner: EntityRef,
    settings: &CopySettings,
    visiting: &mut HashSet<EntityRef>,
) -> ServiceResult<Vec<CopyPlan>> {
    let Some(collection) = store.collections.get_collection(owner)? else {
        return Ok(Vec::new());
    };
    let mut children = Vec::new();
    for child in collection.active() {
        if let Some(plan) = plan_node(store, *child, settings, visiting)? {
            children.push(plan);
        }
    }
    Ok(children)
}

/// Writes `plan` and attaches its new root to `target_owner`.
pub(crate) fn apply_plan(
    store: &Store<'_>,
    plan: &CopyPlan,
    target_owner: EntityRef,
    user_id: i64,
    placement: Placement,
) -> ServiceResult<EntityRef> {
    let new_ref = write_node(store, plan, user_id)?;
    attach(store, target_owner, new_ref, placement)?;
    Ok(new_ref)
}

/// Writes every plan in `plans` under `target_owner`, keeping their order.
pub(crate) fn apply_plans(
    store: &Store<'_>,
    plans: &[CopyPlan],
    target_owner: EntityRef,
    user_id: i64,
) -> ServiceResult<Vec<EntityRef>> {
    let mut collection = store.collections.get_or_new(target_owner)?;
    let mut created = Vec::with_capacity(plans.len());
    for plan in plans {
        let new_ref = write_node(store, plan, user_id)?;
        collection.add_active(new_ref);
        created.push(new_ref);
    }
    store.collections.save_collection(&mut collection)?;
    Ok(created)
}

fn write_node(store: &Store<'_>, plan: &CopyPlan, user_id: i64) -> ServiceResult<EntityRef> {
    match &plan.source {
        PlanSource::Item(item) => {
            let clone = store.items.create_item(&clone_item(item, user_id))?;
            let clone_ref = clone.reference();
            if item.is_section() || !plan.children.is_empty() {
                let mut collection = OrderedCollection::new(clone_ref);
                for child in &plan.children {
                    collection.add_active(write_node(store, child, user_id)?);
                }
                store.collections.save_collection(&mut collection)?;
            }
            Ok(clone_ref)
        }
        PlanSource::Entry(entry) => {
            let clone = store
                .entries
                .create_entry(&NewEntry::cloned_from(entry, user_id))?;
            Ok(clone.reference())
        }
    }
}

fn clone_item(item: &ItemRecord, user_id: i64) -> NewItem {
    NewItem {
        user_id,
        title: item.title.clone(),
        item_type: item.item_type,
        state: ItemState::Todo,
        source_item: Some(item.id),
        extra_data: item.extra_data.clone(),
        recurrence_rule: item.recurrence_rule.clone(),
    }
}

/// Detaches `root` from its parent and deletes it with everything below it,
/// active and inactive alike. Returns the number of entities deleted.
pub(crate) fn delete_subtree(store: &Store<'_>, root: EntityRef) -> ServiceResult<usize> {
    detach(store, root)?;
    let mut visited = HashSet::new();
    delete_node(store, root, &mut visited)
}

fn delete_node(
    store: &Store<'_>,
    node: EntityRef,
    visited: &mut HashSet<EntityRef>,
) -> ServiceResult<usize> {
    if !visited.insert(node) {
        return Ok(0);
    }

    let mut deleted = 0;
    if node.kind.is_container() {
        if let Some(collection) = store.collections.get_collection(node)? {
            for child in collection.active().iter().chain(collection.inactive()) {
                deleted += delete_node(store, *child, visited)?;
            }
            store.collections.delete_collection(node)?;
        }
    }

    match node.kind {
        EntityKind::Item => {
            if store.items.get_item(node.id)?.is_some() {
                store.items.delete_item(node.id)?;
                deleted += 1;
            }
        }
        EntityKind::Day => {
            return Err(RepoError::InvalidData(format!("{node} cannot be deleted as a subtree")).into());
        }
        kind => {
            if let Some(entry_kind) = EntryKind::from_entity_kind(kind) {
                if store.entries.get_entry(entry_kind, node.id)?.is_some() {
                    store.entries.delete_entry(entry_kind, node.id)?;
                    deleted += 1;
                }
            }
        }
    }
    Ok(deleted)
}
