//! Ordered collection use-case service.
//!
//! # Responsibility
//! - Expose per-container snapshots and reordering.
//! - Provide the attach/detach/move helpers every other service uses to
//!   keep parent collections in sync with item state.
//!
//! # Invariants
//! - Collections are saved before the enclosing transaction commits.
//! - Only container kinds can own a collection.

use crate::model::collection::{CollectionSnapshot, OrderedCollection};
use crate::model::reference::EntityRef;
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::{RepoError, Store};
use crate::service::{with_transaction, ServiceResult};
use rusqlite::Connection;

/// Where a new child lands in its parent's active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Back,
    Front,
}

/// Collection service facade.
pub struct CollectionService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CollectionService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns `{active, inactive}` for a container; empty when it has no
    /// collection yet.
    pub fn snapshot(&self, owner: EntityRef) -> ServiceResult<CollectionSnapshot> {
        let store = Store::new(self.conn);
        Ok(store.collections.get_or_new(owner)?.snapshot())
    }

    /// Reorders the active list to `target_order` (intersection semantics).
    pub fn reorder_active(
        &self,
        owner: EntityRef,
        target_order: &[EntityRef],
    ) -> ServiceResult<CollectionSnapshot> {
        with_transaction(self.conn, |store| {
            let mut collection = store
                .collections
                .get_collection(owner)?
                .ok_or(RepoError::NotFound(owner))?;
            collection.reorder_active(target_order);
            store.collections.save_collection(&mut collection)?;
            Ok(collection.snapshot())
        })
    }

    /// Owner of the collection currently holding `member`.
    pub fn find_owner_of(&self, member: EntityRef) -> ServiceResult<Option<EntityRef>> {
        let store = Store::new(self.conn);
        Ok(store
            .collections
            .find_owner_of(member)?
            .map(|collection| collection.owner))
    }
}

/// Adds `child` to the active list of `owner`, creating the collection lazily.
pub(crate) fn attach(
    store: &Store<'_>,
    owner: EntityRef,
    child: EntityRef,
    placement: Placement,
) -> ServiceResult<()> {
    let mut collection = store.collections.get_or_new(owner)?;
    match placement {
        Placement::Back => collection.add_active(child),
        Placement::Front => collection.add_active_front(child),
    }
    store.collections.save_collection(&mut collection)?;
    Ok(())
}

/// Persists an empty collection for a freshly created container.
pub(crate) fn ensure_collection(store: &Store<'_>, owner: EntityRef) -> ServiceResult<()> {
    if store.collections.get_collection(owner)?.is_none() {
        store
            .collections
            .save_collection(&mut OrderedCollection::new(owner))?;
    }
    Ok(())
}

/// Removes `child` from whichever parent list holds it.
///
/// Returns the former owner, or `None` when the child was not attached.
pub(crate) fn detach(store: &Store<'_>, child: EntityRef) -> ServiceResult<Option<EntityRef>> {
    let Some(mut parent) = store.collections.find_owner_of(child)? else {
        return Ok(None);
    };
    parent.remove(&child);
    store.collections.save_collection(&mut parent)?;
    Ok(Some(parent.owner))
}

/// Moves `child` between its parent's lists to match its new activity.
pub(crate) fn set_membership(
    store: &Store<'_>,
    child: EntityRef,
    active: bool,
) -> ServiceResult<Option<EntityRef>> {
    let Some(mut parent) = store.collections.find_owner_of(child)? else {
        return Ok(None);
    };
    if active {
        parent.move_inactive_to_active(child);
    } else {
        parent.move_active_to_inactive(child);
    }
    store.collections.save_collection(&mut parent)?;
    Ok(Some(parent.owner))
}
