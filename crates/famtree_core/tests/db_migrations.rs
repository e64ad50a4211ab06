use famtree_core::db::migrations::latest_version;
use famtree_core::db::{open_db, open_db_in_memory, DbError};
use famtree_core::{SqliteMemberStore, StoreError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "trees");
    assert_table_exists(&conn, "members");
    assert!(table_columns(&conn, "trees").contains(&"shareable_link".to_string()));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("famtree.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "members");
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
fn stores_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteMemberStore::try_new(&conn).err().unwrap();
    match err {
        StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_trees_with_both_or_no_owner() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO trees (
            tree_uuid, name, privacy, owner_uuid, guest_session_id, members, created_at, updated_at
        ) VALUES (?1, 'Tree', 'private', ?2, ?3, '[]', 0, 0);";

    let both = conn.execute(
        insert,
        rusqlite::params!["t-both", "u-1", "0123456789abcdef0123456789abcdef"],
    );
    assert!(both.is_err());

    let neither = conn.execute(
        insert,
        rusqlite::params!["t-none", Option::<String>::None, Option::<String>::None],
    );
    assert!(neither.is_err());

    let owned = conn.execute(
        insert,
        rusqlite::params!["t-owned", "u-1", Option::<String>::None],
    );
    assert_eq!(owned.unwrap(), 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_columns(conn: &Connection, table_name: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table_name});"))
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let column_name: String = row.get(1).unwrap();
        columns.push(column_name);
    }
    columns
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
