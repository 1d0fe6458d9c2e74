use chrono::NaiveDate;
use daybook_core::db::open_db_in_memory;
use daybook_core::{
    CollectionService, DayRecord, DayService, EntityKind, EntityRef, ItemRecord, ItemService,
    ItemType, MigrationService, MigrationSettings, Placement, ServiceError, UserConfig,
    UserService,
};
use rusqlite::Connection;

struct Fixture {
    conn: Connection,
    user_id: i64,
}

impl Fixture {
    fn with_sections(sections: &[&str]) -> Self {
        let conn = open_db_in_memory().unwrap();
        let user = UserService::new(&conn)
            .create_user("tester", &UserConfig::with_sections(sections.iter().copied()))
            .unwrap();
        Self {
            conn,
            user_id: user.id,
        }
    }

    fn day(&self, value: &str) -> DayRecord {
        DayService::new(&self.conn)
            .find_or_create(self.user_id, date(value))
            .unwrap()
            .day
    }

    fn add(&self, owner: EntityRef, title: &str, item_type: ItemType) -> ItemRecord {
        ItemService::new(&self.conn)
            .create_item(self.user_id, owner, title, item_type, Placement::Back)
            .unwrap()
    }

    fn titles(&self, owner: EntityRef) -> Vec<String> {
        let items = ItemService::new(&self.conn);
        CollectionService::new(&self.conn)
            .snapshot(owner)
            .unwrap()
            .active
            .into_iter()
            .filter(|reference| reference.kind == EntityKind::Item)
            .map(|reference| items.get_item(reference.id).unwrap().unwrap().title)
            .collect()
    }

    fn root_section(&self, day: &DayRecord, title: &str) -> ItemRecord {
        let items = ItemService::new(&self.conn);
        CollectionService::new(&self.conn)
            .snapshot(day.reference())
            .unwrap()
            .active
            .into_iter()
            .filter(|reference| reference.kind == EntityKind::Item)
            .map(|reference| items.get_item(reference.id).unwrap().unwrap())
            .find(|item| item.is_section() && item.title == title)
            .unwrap()
    }

    fn reload_day(&self, id: i64) -> DayRecord {
        DayService::new(&self.conn).get_day(id).unwrap().unwrap()
    }
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

#[test]
fn migration_copies_open_roots_in_order_and_links_days() {
    let fx = Fixture::with_sections(&[]);
    let source = fx.day("2025-01-15");
    for title in ["First", "Second", "Third"] {
        fx.add(source.reference(), title, ItemType::Completable);
    }
    let finished = fx.add(source.reference(), "Finished", ItemType::Completable);
    ItemService::new(&fx.conn)
        .complete_item(fx.user_id, finished.id)
        .unwrap();

    let outcome = MigrationService::new(&fx.conn)
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap();

    assert!(outcome.target_created);
    assert_eq!(outcome.migrated_count, 3);
    assert_eq!(
        fx.titles(outcome.target_day.reference()),
        vec!["First", "Second", "Third"]
    );

    let source = fx.reload_day(source.id);
    assert_eq!(source.imported_to, Some(outcome.target_day.id));
    assert_eq!(outcome.target_day.imported_from, Some(source.id));
    assert!(source.imported_at.is_some());
    assert!(outcome.target_day.imported_at.is_some());
}

#[test]
fn a_day_can_only_be_migrated_once() {
    let fx = Fixture::with_sections(&[]);
    let source = fx.day("2025-01-15");
    fx.add(source.reference(), "Task", ItemType::Completable);

    let migrations = MigrationService::new(&fx.conn);
    let first = migrations
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap();

    let err = migrations
        .migrate_day(fx.user_id, source.id, date("2025-01-17"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyMigrated(id) if id == source.id));
    assert!(err.to_string().contains("already been migrated"));

    let source = fx.reload_day(source.id);
    assert_eq!(source.imported_to, Some(first.target_day.id));
    assert!(DayService::new(&fx.conn)
        .find_day(fx.user_id, date("2025-01-17"))
        .unwrap()
        .is_none());
}

#[test]
fn target_with_an_earlier_import_and_same_day_are_rejected() {
    let fx = Fixture::with_sections(&[]);
    let monday = fx.day("2025-01-13");
    let tuesday = fx.day("2025-01-14");
    let migrations = MigrationService::new(&fx.conn);

    migrations
        .migrate_day(fx.user_id, monday.id, date("2025-01-15"))
        .unwrap();
    let err = migrations
        .migrate_day(fx.user_id, tuesday.id, date("2025-01-15"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::TargetAlreadyImported(_)));

    let err = migrations
        .migrate_day(fx.user_id, tuesday.id, date("2025-01-14"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::SameDayMigration(_)));
    assert_eq!(fx.reload_day(tuesday.id).imported_to, None);
}

#[test]
fn permanent_sections_are_merged_instead_of_duplicated() {
    let fx = Fixture::with_sections(&["Work", "Home"]);
    let source = fx.day("2025-01-15");
    let work = fx.root_section(&source, "Work");
    fx.add(work.reference(), "Ship release", ItemType::Completable);
    fx.add(work.reference(), "Review PR", ItemType::Completable);
    fx.add(source.reference(), "Loose task", ItemType::Completable);

    let target = fx.day("2025-01-16");
    let target_work = fx.root_section(&target, "Work");
    fx.add(target_work.reference(), "Already planned", ItemType::Completable);

    let outcome = MigrationService::new(&fx.conn)
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap();

    assert!(!outcome.target_created);
    assert_eq!(outcome.migrated_count, 1);
    assert_eq!(outcome.merged_sections, 2);
    assert_eq!(
        fx.titles(target.reference()),
        vec!["Work", "Home", "Loose task"]
    );
    assert_eq!(
        fx.titles(target_work.reference()),
        vec!["Already planned", "Ship release", "Review PR"]
    );
}

#[test]
fn missing_permanent_section_on_existing_target_is_created_on_merge() {
    let fx = Fixture::with_sections(&[]);
    let target = fx.day("2025-01-16");

    UserService::new(&fx.conn)
        .update_config(fx.user_id, &UserConfig::with_sections(["Work"]))
        .unwrap();
    let source = fx.day("2025-01-15");
    let work = fx.root_section(&source, "Work");
    fx.add(work.reference(), "Carry over", ItemType::Completable);

    MigrationService::new(&fx.conn)
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap();

    assert_eq!(fx.titles(target.reference()), vec!["Work"]);
    let target_work = fx.root_section(&target, "Work");
    assert!(target_work.is_permanent_section());
    assert_eq!(fx.titles(target_work.reference()), vec!["Carry over"]);
}

#[test]
fn settings_control_root_notes_links_and_plain_sections() {
    let fx = Fixture::with_sections(&[]);
    let source = fx.day("2025-01-15");
    let items = ItemService::new(&fx.conn);
    items
        .add_note(fx.user_id, source.reference(), "remember")
        .unwrap();
    items
        .add_link(fx.user_id, source.reference(), "site", "https://example.com")
        .unwrap();
    let section = fx.add(source.reference(), "Reading", ItemType::Section);
    fx.add(section.reference(), "Chapter 3", ItemType::Completable);
    fx.add(source.reference(), "Task", ItemType::Completable);

    let mut settings = MigrationSettings::default();
    settings.notes = false;
    settings.links = false;
    settings.active_item_sections = false;

    let outcome = MigrationService::new(&fx.conn)
        .migrate_day_with(fx.user_id, source.id, date("2025-01-16"), &settings)
        .unwrap();

    assert_eq!(outcome.migrated_count, 1);
    let root = CollectionService::new(&fx.conn)
        .snapshot(outcome.target_day.reference())
        .unwrap();
    assert_eq!(root.active.len(), 1);
    assert_eq!(fx.titles(outcome.target_day.reference()), vec!["Task"]);
}

#[test]
fn root_notes_and_links_migrate_by_default() {
    let fx = Fixture::with_sections(&[]);
    let source = fx.day("2025-01-15");
    let items = ItemService::new(&fx.conn);
    items
        .add_note(fx.user_id, source.reference(), "remember")
        .unwrap();
    items
        .add_link(fx.user_id, source.reference(), "site", "https://example.com")
        .unwrap();

    let outcome = MigrationService::new(&fx.conn)
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap();

    let kinds: Vec<EntityKind> = CollectionService::new(&fx.conn)
        .snapshot(outcome.target_day.reference())
        .unwrap()
        .active
        .into_iter()
        .map(|reference| reference.kind)
        .collect();
    assert_eq!(kinds, vec![EntityKind::Note, EntityKind::Link]);
    assert_eq!(outcome.migrated_count, 2);
}

#[test]
fn reopening_a_day_does_not_add_sections() {
    let fx = Fixture::with_sections(&["Work"]);
    let day = fx.day("2025-01-15");
    let days = DayService::new(&fx.conn);
    days.close_day(fx.user_id, day.id).unwrap();

    UserService::new(&fx.conn)
        .update_config(fx.user_id, &UserConfig::with_sections(["Work", "Home"]))
        .unwrap();
    let reopened = days.reopen_day(fx.user_id, day.id).unwrap();

    assert!(reopened.closed_at.is_some());
    assert!(reopened.reopened_at.is_some());
    assert_eq!(fx.titles(day.reference()), vec!["Work"]);

    let again = days.find_or_create(fx.user_id, date("2025-01-15")).unwrap();
    assert!(!again.created);
    assert_eq!(again.sections_added, 0);
    assert_eq!(fx.titles(day.reference()), vec!["Work"]);
}

#[test]
fn root_notes_follow_root_flag_when_item_notes_are_off() {
    let fx = Fixture::with_sections(&[]);
    let source = fx.day("2025-01-15");
    let items = ItemService::new(&fx.conn);
    items
        .add_note(fx.user_id, source.reference(), "root note")
        .unwrap();
    let task = fx.add(source.reference(), "Task", ItemType::Completable);
    items
        .add_note(fx.user_id, task.reference(), "nested note")
        .unwrap();

    let mut settings = MigrationSettings::default();
    settings.notes = true;
    settings.items.notes = false;

    let outcome = MigrationService::new(&fx.conn)
        .migrate_day_with(fx.user_id, source.id, date("2025-01-16"), &settings)
        .unwrap();

    let root = CollectionService::new(&fx.conn)
        .snapshot(outcome.target_day.reference())
        .unwrap()
        .active;
    let kinds: Vec<EntityKind> = root.iter().map(|reference| reference.kind).collect();
    assert_eq!(kinds, vec![EntityKind::Note, EntityKind::Item]);
    assert_eq!(outcome.migrated_count, 2);

    let copied_task = CollectionService::new(&fx.conn).snapshot(root[1]).unwrap();
    assert!(copied_task.active.is_empty());
}

#[test]
fn failed_migration_leaves_source_and_target_untouched() {
    let fx = Fixture::with_sections(&["Work"]);
    let source = fx.day("2025-01-15");
    let work = fx.root_section(&source, "Work");
    let nested = fx.add(work.reference(), "Ship release", ItemType::Completable);
    let loose = fx.add(source.reference(), "Loose task", ItemType::Completable);
    let items_before: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();

    // Abort at the final link step, after every copy has been written.
    fx.conn
        .execute_batch(
            "CREATE TRIGGER block_import BEFORE UPDATE OF imported_to_day_id ON days
             BEGIN SELECT RAISE(ABORT, 'import blocked'); END;",
        )
        .unwrap();

    let err = MigrationService::new(&fx.conn)
        .migrate_day(fx.user_id, source.id, date("2025-01-16"))
        .unwrap_err();
    assert!(err.to_string().contains("import blocked"));

    let items_after: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(items_after, items_before);
    let source = fx.reload_day(source.id);
    assert_eq!(source.imported_to, None);
    assert_eq!(source.imported_at, None);
    assert!(DayService::new(&fx.conn)
        .find_day(fx.user_id, date("2025-01-16"))
        .unwrap()
        .is_none());
    assert_eq!(fx.titles(source.reference()), vec!["Work", "Loose task"]);
    assert_eq!(fx.titles(work.reference()), vec!["Ship release"]);
    let nested = ItemService::new(&fx.conn).get_item(nested.id).unwrap().unwrap();
    let loose = ItemService::new(&fx.conn).get_item(loose.id).unwrap().unwrap();
    assert_eq!(nested.title, "Ship release");
    assert_eq!(loose.title, "Loose task");
}
