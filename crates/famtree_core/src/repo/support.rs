//! Row codecs and connection checks shared by the SQLite stores.

use super::error::{StoreError, StoreResult};
use crate::db::migrations::latest_version;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Verifies the connection is migrated and `table` carries `columns`.
pub(crate) fn ensure_store_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(StoreError::MissingRequiredTable(table));
    }

    for column in columns {
        if !table_has_column(conn, table, column)? {
            return Err(StoreError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

/// Opens the write transaction that scopes one document update.
pub(crate) fn begin_document_update(conn: &Connection) -> StoreResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> StoreResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn encode_json<T: Serialize>(value: &T, column: &'static str) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode {column}: {err}")))
}

pub(crate) fn decode_json<T: DeserializeOwned>(text: &str, column: &'static str) -> StoreResult<T> {
    serde_json::from_str(text)
        .map_err(|err| StoreError::InvalidData(format!("invalid json in {column}: {err}")))
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{decode_json, encode_json, parse_uuid};
    use crate::repo::StoreError;
    use uuid::Uuid;

    #[test]
    fn json_id_lists_keep_order() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let text = encode_json(&ids, "members.children").unwrap();
        let decoded: Vec<Uuid> = decode_json(&text, "members.children").unwrap();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn invalid_payloads_surface_as_invalid_data() {
        let err = decode_json::<Vec<Uuid>>("[\"nope\"]", "trees.members").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(message) if message.contains("trees.members")));

        let err = parse_uuid("42", "members.member_uuid").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
