use daybook_core::db::migrations::{apply_migrations, latest_version};
use daybook_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "users",
        "days",
        "items",
        "entries",
        "collections",
        "collection_members",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "collection_members");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_schema_step_is_named_and_rolled_back() {
    let mut conn = Connection::open_in_memory().unwrap();
    // Pre-existing table without the indexed columns breaks the collections step.
    conn.execute_batch("CREATE TABLE collection_members (legacy INTEGER);")
        .unwrap();

    match apply_migrations(&mut conn).unwrap_err() {
        DbError::Migration { version, name, .. } => {
            assert_eq!(version, 2);
            assert_eq!(name, "collections");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(schema_version(&conn), 0);
    let users_tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(users_tables, 0);
}

#[test]
fn foreign_keys_are_enforced_on_every_connection() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO days (user_id, date) VALUES (42, '2025-01-15');",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn locked_item_types_cannot_be_stored_outside_todo() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO users (name) VALUES ('u');", [])
        .unwrap();

    let result = conn.execute(
        "INSERT INTO items (user_id, title, item_type, state)
         VALUES (1, 'Work', 'section', 'done');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
