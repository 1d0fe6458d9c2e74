//! Ordered child collection owned by one container.
//!
//! # Responsibility
//! - Keep the `active`/`inactive` ordered reference lists of one container.
//! - Offer the only mutation primitives allowed on those lists.
//!
//! # Invariants
//! - Neither list contains duplicates.
//! - A reference is never present in both lists.
//! - Mutations are in-memory only; callers persist explicitly.

use crate::model::reference::EntityRef;
use serde::{Deserialize, Serialize};

/// Stable row id of a persisted collection.
pub type CollectionId = i64;

/// Queryable `{active, inactive}` view of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub active: Vec<EntityRef>,
    pub inactive: Vec<EntityRef>,
}

/// Active/inactive reference lists plus their owning container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedCollection {
    /// `None` until the collection has been persisted.
    pub id: Option<CollectionId>,
    pub owner: EntityRef,
    active: Vec<EntityRef>,
    inactive: Vec<EntityRef>,
}

impl OrderedCollection {
    /// Creates an empty, not yet persisted collection for `owner`.
    pub fn new(owner: EntityRef) -> Self {
        Self {
            id: None,
            owner,
            active: Vec::new(),
            inactive: Vec::new(),
        }
    }

    /// Rebuilds a collection from persisted lists, repairing duplicates.
    ///
    /// Earlier entries win; a reference found in both lists stays active.
    pub fn from_parts(
        id: Option<CollectionId>,
        owner: EntityRef,
        active: Vec<EntityRef>,
        inactive: Vec<EntityRef>,
    ) -> Self {
        let mut collection = Self::new(owner);
        collection.id = id;
        for reference in active {
            collection.add_active(reference);
        }
        for reference in inactive {
            if !collection.contains_active(&reference) {
                collection.add_inactive(reference);
            }
        }
        collection
    }

    pub fn active(&self) -> &[EntityRef] {
        &self.active
    }

    pub fn inactive(&self) -> &[EntityRef] {
        &self.inactive
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty()
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot {
            active: self.active.clone(),
            inactive: self.inactive.clone(),
        }
    }

    pub fn contains_active(&self, reference: &EntityRef) -> bool {
        self.active.contains(reference)
    }

    pub fn contains_inactive(&self, reference: &EntityRef) -> bool {
        self.inactive.contains(reference)
    }

    pub fn contains(&self, reference: &EntityRef) -> bool {
        self.contains_active(reference) || self.contains_inactive(reference)
    }

    /// Appends to the active list. No-op when already active.
    ///
    /// A reference currently inactive is moved, keeping the lists disjoint.
    pub fn add_active(&mut self, reference: EntityRef) {
        if self.contains_active(&reference) {
            return;
        }
        self.inactive.retain(|current| *current != reference);
        self.active.push(reference);
    }

    /// Prepends to the active list. No-op when already active.
    pub fn add_active_front(&mut self, reference: EntityRef) {
        if self.contains_active(&reference) {
            return;
        }
        self.inactive.retain(|current| *current != reference);
        self.active.insert(0, reference);
    }

    /// Appends to the inactive list. No-op when already inactive.
    pub fn add_inactive(&mut self, reference: EntityRef) {
        if self.contains_inactive(&reference) {
            return;
        }
        self.active.retain(|current| *current != reference);
        self.inactive.push(reference);
    }

    /// Returns whether the reference was present.
    pub fn remove_active(&mut self, reference: &EntityRef) -> bool {
        let before = self.active.len();
        self.active.retain(|current| current != reference);
        before != self.active.len()
    }

    /// Returns whether the reference was present.
    pub fn remove_inactive(&mut self, reference: &EntityRef) -> bool {
        let before = self.inactive.len();
        self.inactive.retain(|current| current != reference);
        before != self.inactive.len()
    }

    /// Removes the reference from whichever list holds it.
    pub fn remove(&mut self, reference: &EntityRef) -> bool {
        let removed_active = self.remove_active(reference);
        let removed_inactive = self.remove_inactive(reference);
        removed_active || removed_inactive
    }

    pub fn move_active_to_inactive(&mut self, reference: EntityRef) {
        self.remove_active(&reference);
        self.add_inactive(reference);
    }

    pub fn move_inactive_to_active(&mut self, reference: EntityRef) {
        self.remove_inactive(&reference);
        self.add_active(reference);
    }

    /// Replaces the active order with `target_order` restricted to the
    /// references currently active. Unknown and repeated entries are dropped.
    pub fn reorder_active(&mut self, target_order: &[EntityRef]) {
        let mut reordered: Vec<EntityRef> = Vec::with_capacity(self.active.len());
        for reference in target_order {
            if self.active.contains(reference) && !reordered.contains(reference) {
                reordered.push(*reference);
            }
        }
        self.active = reordered;
    }
}

#[cfg(test)]
mod tests {
    use super::OrderedCollection;
    use crate::model::reference::{EntityKind, EntityRef};

    fn item(id: i64) -> EntityRef {
        EntityRef::item(id)
    }

    fn collection() -> OrderedCollection {
        OrderedCollection::new(EntityRef::day(1))
    }

    #[test]
    fn adds_are_idempotent_and_ordered() {
        let mut c = collection();
        c.add_active(item(1));
        c.add_active(item(2));
        c.add_active(item(1));
        c.add_active_front(item(3));
        c.add_active_front(item(2));

        assert_eq!(c.active(), &[item(3), item(1), item(2)]);
        assert!(c.inactive().is_empty());
    }

    #[test]
    fn lists_stay_disjoint() {
        let mut c = collection();
        c.add_active(item(1));
        c.add_inactive(item(1));
        assert!(!c.contains_active(&item(1)));
        assert!(c.contains_inactive(&item(1)));

        c.add_active(item(1));
        assert!(c.contains_active(&item(1)));
        assert!(!c.contains_inactive(&item(1)));
    }

    #[test]
    fn move_between_lists() {
        let mut c = collection();
        c.add_active(item(1));
        c.add_active(item(2));

        c.move_active_to_inactive(item(1));
        assert_eq!(c.active(), &[item(2)]);
        assert_eq!(c.inactive(), &[item(1)]);

        c.move_inactive_to_active(item(1));
        assert_eq!(c.active(), &[item(2), item(1)]);
        assert!(c.inactive().is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let mut c = collection();
        c.add_active(item(1));
        c.add_inactive(item(2));

        assert!(c.remove_active(&item(1)));
        assert!(!c.remove_active(&item(1)));
        assert!(!c.remove_inactive(&item(1)));
        assert!(c.remove(&item(2)));
        assert!(c.is_empty());
    }

    #[test]
    fn reorder_is_intersection_with_active_set() {
        let mut c = collection();
        c.add_active(item(1));
        c.add_active(item(2));
        c.add_active(item(3));
        c.add_inactive(item(4));

        c.reorder_active(&[item(3), item(9), item(1), item(4), item(3), item(2)]);
        assert_eq!(c.active(), &[item(3), item(1), item(2)]);
        assert_eq!(c.inactive(), &[item(4)]);
    }

    #[test]
    fn from_parts_repairs_duplicates_and_overlap() {
        let note = EntityRef::new(EntityKind::Note, 7);
        let c = OrderedCollection::from_parts(
            Some(10),
            EntityRef::day(1),
            vec![item(1), note, item(1)],
            vec![note, item(2), item(2)],
        );
        assert_eq!(c.id, Some(10));
        assert_eq!(c.active(), &[item(1), note]);
        assert_eq!(c.inactive(), &[item(2)]);
    }

    #[test]
    fn snapshot_serializes_reference_maps() {
        let mut c = collection();
        c.add_active(item(123));
        c.add_inactive(EntityRef::new(EntityKind::Link, 5));
        let json = serde_json::to_string(&c.snapshot()).unwrap();
        assert_eq!(json, r#"{"active":[{"Item":123}],"inactive":[{"Link":5}]}"#);
    }
}
