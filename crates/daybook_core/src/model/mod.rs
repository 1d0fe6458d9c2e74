//! Domain model for days, items and their ordered child collections.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep pure algorithms (collection mutation, recurrence) free of storage.
//!
//! # Invariants
//! - Every child entity is addressed by a typed `EntityRef`.
//! - Containers own at most one `OrderedCollection`.

pub mod collection;
pub mod day;
pub mod entry;
pub mod item;
pub mod recurrence;
pub mod reference;
