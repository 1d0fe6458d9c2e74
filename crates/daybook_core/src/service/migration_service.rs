//! Day-to-day migration.
//!
//! # Responsibility
//! - Copy a day's eligible active tree into the day for another date.
//! - Merge permanent sections instead of duplicating them.
//! - Link source and target days exactly once.
//!
//! # Invariants
//! - A source day is migrated at most once (`imported_to` is single-use).
//! - A target day receives at most one migration (`imported_from`).
//! - Root order on the target follows the source order.
//! - `migrated_count` counts root copies only; permanent section merges are
//!   not counted.
//! - Root notes follow `notes`; `items.notes` applies only below items.

use crate::config::{CopySettings, MigrationSettings, UserConfig};
use crate::model::day::{DayId, DayRecord};
use crate::model::item::ItemRecord;
use crate::model::reference::EntityKind;
use crate::repo::day_repo::DayRepository;
use crate::repo::Store;
use crate::service::collection_service::Placement;
use crate::service::copy_service::{apply_plan, apply_plans, plan_children, plan_subtree};
use crate::service::day_service::resolve_day;
use crate::service::section_service::find_or_create_root_section;
use crate::service::{ensure_owner, with_transaction, ServiceError, ServiceResult};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub target_day: DayRecord,
    pub target_created: bool,
    pub migrated_count: usize,
    /// Permanent sections whose children were merged into the target.
    pub merged_sections: usize,
}

/// Day migration service facade.
pub struct MigrationService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> MigrationService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Migrates with the user's stored settings.
    pub fn migrate_day(
        &self,
        user_id: i64,
        source_day_id: DayId,
        target_date: NaiveDate,
    ) -> ServiceResult<MigrationOutcome> {
        self.run(user_id, source_day_id, target_date, None)
    }

    /// Migrates with explicit settings instead of the stored ones.
    pub fn migrate_day_with(
        &self,
        user_id: i64,
        source_day_id: DayId,
        target_date: NaiveDate,
        settings: &MigrationSettings,
    ) -> ServiceResult<MigrationOutcome> {
        self.run(user_id, source_day_id, target_date, Some(settings))
    }

    fn run(
        &self,
        user_id: i64,
        source_day_id: DayId,
        target_date: NaiveDate,
        settings: Option<&MigrationSettings>,
    ) -> ServiceResult<MigrationOutcome> {
        let outcome = with_transaction(self.conn, |store| {
            migrate(store, user_id, source_day_id, target_date, settings)
        });

        match &outcome {
            Ok(result) => info!(
                "event=day_migrate module=service status=ok source_day_id={} target_day_id={} target_created={} migrated_count={} merged_sections={}",
                source_day_id,
                result.target_day.id,
                result.target_created,
                result.migrated_count,
                result.merged_sections
            ),
            Err(err) => warn!(
                "event=day_migrate module=service status=error source_day_id={} error={}",
                source_day_id, err
            ),
        }
        outcome
    }
}

fn migrate(
    store: &Store<'_>,
    user_id: i64,
    source_day_id: DayId,
    target_date: NaiveDate,
    settings: Option<&MigrationSettings>,
) -> ServiceResult<MigrationOutcome> {
    let user = store.users.require(user_id)?;
    let settings = settings.unwrap_or(&user.config.settings);
    let copy_settings = settings.copy_settings();
    let root_settings = CopySettings {
        notes: settings.notes,
        ..copy_settings
    };

    let source = store.days.require(source_day_id)?;
    ensure_owner(user_id, source.user_id)?;
    if source.is_migrated() {
        return Err(ServiceError::AlreadyMigrated(source.id));
    }
    if source.date == target_date {
        return Err(ServiceError::SameDayMigration(source.id));
    }

    let resolved = resolve_day(store, &user.config, user_id, target_date)?;
    let target = resolved.day;
    if target.imported_from.is_some() {
        return Err(ServiceError::TargetAlreadyImported(target.id));
    }

    let roots = store.collections.get_or_new(source.reference())?;
    let mut migrated_count = 0;
    let mut merged_sections = 0;

    for root in roots.active() {
        match root.kind {
            EntityKind::Item => {
                let item = store.items.require(root.id)?;
                if item.is_section() {
                    if let Some(title) = permanent_title(&user.config, &item) {
                        let section = find_or_create_root_section(store, &target, title)?;
                        let children = plan_children(store, item.reference(), &copy_settings)?;
                        apply_plans(store, &children, section.reference(), user_id)?;
                        merged_sections += 1;
                        continue;
                    }
                    if !settings.active_item_sections {
                        continue;
                    }
                }
            }
            EntityKind::Note if !settings.notes => continue,
            EntityKind::Link if !settings.links => continue,
            _ => {}
        }

        let plan = if root.kind == EntityKind::Item {
            plan_subtree(store, *root, &copy_settings)?
        } else {
            plan_subtree(store, *root, &root_settings)?
        };
        if let Some(plan) = plan {
            apply_plan(store, &plan, target.reference(), user_id, Placement::Back)?;
            migrated_count += 1;
        }
    }

    store.days.link_import(source.id, target.id)?;
    let target_day = store.days.require(target.id)?;

    Ok(MigrationOutcome {
        target_day,
        target_created: resolved.created,
        migrated_count,
        merged_sections,
    })
}

/// Configured title for a root section flagged as permanent.
fn permanent_title<'a>(config: &'a UserConfig, item: &ItemRecord) -> Option<&'a str> {
    if !item.is_permanent_section() {
        return None;
    }
    config.permanent_section_title(&item.title)
}

