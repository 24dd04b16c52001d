use pichime_core::db::migrations::latest_version;
use pichime_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "events");
    assert_table_exists(&conn, "reminders");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pichime.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "reminders");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn foreign_keys_reject_orphan_reminders() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO reminders (uuid, event_uuid, fire_at, anchor_at, repeat_kind)
         VALUES ('r1', 'missing-event', '2024-01-01 08:00:00', '2024-01-01 08:00:00', 'never');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn boolean_columns_reject_out_of_range_values() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO events (uuid, title) VALUES ('e1', 'walk the dog');",
        [],
    )
    .unwrap();
    let result = conn.execute(
        "INSERT INTO reminders (uuid, event_uuid, fire_at, anchor_at, tone, repeat_kind)
         VALUES ('r1', 'e1', '2024-01-01 08:00:00', '2024-01-01 08:00:00', 2, 'never');",
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
                SELECT 1 FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "expected table `{table_name}` to exist");
}
