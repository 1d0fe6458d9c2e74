use chrono::NaiveDate;
use daybook_core::db::open_db_in_memory;
use daybook_core::{
    CollectionService, DayRecord, DayService, EntityKind, EntityRef, ItemRecord, ItemService,
    ItemState, ItemType, Placement, UserConfig, UserService,
};
use rusqlite::Connection;
use serde_json::json;

const DAILY: &str = r#"{"frequency":"daily"}"#;

struct Fixture {
    conn: Connection,
    user_id: i64,
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let user = UserService::new(&conn)
            .create_user("tester", &UserConfig::with_sections(["Work"]))
            .unwrap();
        Self {
            conn,
            user_id: user.id,
        }
    }

    fn items(&self) -> ItemService<'_> {
        ItemService::new(&self.conn)
    }

    fn day(&self, value: &str) -> DayRecord {
        DayService::new(&self.conn)
            .find_or_create(self.user_id, date(value))
            .unwrap()
            .day
    }

    fn existing_day(&self, value: &str) -> Option<DayRecord> {
        DayService::new(&self.conn)
            .find_day(self.user_id, date(value))
            .unwrap()
    }

    fn recurring(&self, owner: EntityRef, title: &str, rule: &str) -> ItemRecord {
        let item = self
            .items()
            .create_item(self.user_id, owner, title, ItemType::Completable, Placement::Back)
            .unwrap();
        self.items()
            .set_recurrence_rule(self.user_id, item.id, Some(rule.to_string()))
            .unwrap()
    }

    fn active(&self, owner: EntityRef) -> Vec<EntityRef> {
        CollectionService::new(&self.conn)
            .snapshot(owner)
            .unwrap()
            .active
    }

    fn work_section(&self, day: &DayRecord) -> EntityRef {
        self.active(day.reference())
            .into_iter()
            .filter(|reference| reference.kind == EntityKind::Item)
            .find(|reference| {
                self.items().get_item(reference.id).unwrap().unwrap().title == "Work"
            })
            .unwrap()
    }
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

#[test]
fn completing_creates_one_linked_next_occurrence() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-15");
    let work = fx.work_section(&today);
    let habit = fx.recurring(work, "Stretch", DAILY);
    fx.items()
        .set_extra_data(fx.user_id, habit.id, json!({ "streak": 3 }))
        .unwrap();

    let done = fx
        .items()
        .complete_item_on(fx.user_id, habit.id, date("2025-01-15"))
        .unwrap();
    assert_eq!(done.state, ItemState::Done);
    assert!(done.done_at.is_some());

    let next_id = done.recurring_next_item.unwrap();
    let next = fx.items().get_item(next_id).unwrap().unwrap();
    assert_eq!(next.title, "Stretch");
    assert_eq!(next.state, ItemState::Todo);
    assert_eq!(next.recurrence_rule.as_deref(), Some(DAILY));
    assert_eq!(next.extra_data, json!({ "streak": 3 }));
    assert_eq!(next.source_item, None);

    let tomorrow = fx.existing_day("2025-01-16").unwrap();
    assert_eq!(fx.active(fx.work_section(&tomorrow)), vec![next.reference()]);
}

#[test]
fn restoring_removes_the_next_occurrence() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-15");
    let work = fx.work_section(&today);
    let habit = fx.recurring(work, "Stretch", DAILY);

    let done = fx
        .items()
        .complete_item_on(fx.user_id, habit.id, date("2025-01-15"))
        .unwrap();
    let next_id = done.recurring_next_item.unwrap();

    let restored = fx.items().restore_item(fx.user_id, habit.id).unwrap();
    assert_eq!(restored.state, ItemState::Todo);
    assert_eq!(restored.recurring_next_item, None);
    assert!(fx.items().get_item(next_id).unwrap().is_none());

    let tomorrow = fx.existing_day("2025-01-16").unwrap();
    assert!(fx.active(fx.work_section(&tomorrow)).is_empty());
    assert_eq!(fx.active(work), vec![habit.reference()]);

    let again = fx
        .items()
        .complete_item_on(fx.user_id, habit.id, date("2025-01-15"))
        .unwrap();
    assert!(again.recurring_next_item.is_some());
    assert_eq!(fx.active(fx.work_section(&tomorrow)).len(), 1);
}

#[test]
fn monthly_rule_clamps_to_month_end() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-31");
    let bill = fx.recurring(today.reference(), "Pay card", r#"{"frequency":"monthly"}"#);

    fx.items()
        .complete_item_on(fx.user_id, bill.id, date("2025-01-31"))
        .unwrap();

    let february = fx.existing_day("2025-02-28").unwrap();
    let root = fx.active(february.reference());
    assert_eq!(root.len(), 2);
    let next = fx.items().get_item(root[1].id).unwrap().unwrap();
    assert_eq!(next.title, "Pay card");
}

#[test]
fn rules_without_a_next_date_schedule_nothing() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-15");
    let broken = fx.recurring(
        today.reference(),
        "Never",
        r#"{"frequency":"every_n_days","interval":0}"#,
    );
    let plain = fx
        .items()
        .create_item(fx.user_id, today.reference(), "Once", ItemType::Completable, Placement::Back)
        .unwrap();

    let done = fx
        .items()
        .complete_item_on(fx.user_id, broken.id, date("2025-01-15"))
        .unwrap();
    assert_eq!(done.recurring_next_item, None);

    let done = fx
        .items()
        .complete_item_on(fx.user_id, plain.id, date("2025-01-15"))
        .unwrap();
    assert_eq!(done.recurring_next_item, None);
    assert!(fx.existing_day("2025-01-16").is_none());
}

#[test]
fn dropping_a_recurring_item_does_not_schedule() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-15");
    let habit = fx.recurring(today.reference(), "Run", DAILY);

    let dropped = fx.items().drop_item(fx.user_id, habit.id).unwrap();
    assert_eq!(dropped.state, ItemState::Dropped);
    assert_eq!(dropped.recurring_next_item, None);
    assert!(fx.existing_day("2025-01-16").is_none());
}

#[test]
fn restoring_removes_occurrences_chained_after_the_next_one() {
    let fx = Fixture::new();
    let today = fx.day("2025-01-15");
    let work = fx.work_section(&today);
    let habit = fx.recurring(work, "Stretch", DAILY);

    let done = fx
        .items()
        .complete_item_on(fx.user_id, habit.id, date("2025-01-15"))
        .unwrap();
    let next_id = done.recurring_next_item.unwrap();
    let next_done = fx
        .items()
        .complete_item_on(fx.user_id, next_id, date("2025-01-16"))
        .unwrap();
    let chained_id = next_done.recurring_next_item.unwrap();
    let day_after = fx.existing_day("2025-01-17").unwrap();
    assert_eq!(fx.active(fx.work_section(&day_after)).len(), 1);

    let restored = fx.items().restore_item(fx.user_id, habit.id).unwrap();
    assert_eq!(restored.recurring_next_item, None);
    assert!(fx.items().get_item(next_id).unwrap().is_none());
    assert!(fx.items().get_item(chained_id).unwrap().is_none());
    assert!(fx.active(fx.work_section(&day_after)).is_empty());

    let remaining: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM items WHERE title = 'Stretch';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(remaining, 1);
}
