#![forbid(unsafe_code)]

mod sql;

use super::super::StoreError;
use super::time::now_ms;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(in crate::store) const SCHEMA_VERSION: i64 = 1;

const REQUIRED_TABLES: &[&str] = &[
    "store_state",
    "commits",
    "projects",
    "directories",
    "branches",
    "tags",
    "directory_locations",
    "files",
    "file_names",
    "file_revisions",
    "provisional_directory_locations",
];

/// Refuses databases written by another schema. Returns `true` for an empty
/// database, which still needs [`install_schema`].
pub(in crate::store) fn preflight_gate(conn: &Connection) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(true);
    }

    if tables
        .iter()
        .any(|table| !REQUIRED_TABLES.contains(&table.as_str()))
    {
        return Err(StoreError::SchemaMismatch("unsupported tables detected"));
    }
    if REQUIRED_TABLES.iter().any(|table| !tables.contains(*table)) {
        return Err(StoreError::SchemaMismatch("required table is missing"));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(false),
        Some(_) => Err(StoreError::SchemaMismatch("schema version mismatch")),
        None => Err(StoreError::SchemaMismatch("schema state row is missing")),
    }
}

/// Creates every table in one transaction so a concurrent opener never sees a
/// partial schema.
pub(in crate::store) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&sql::full_schema_sql())?;

    let now_ms = now_ms();
    tx.execute(
        "INSERT OR IGNORE INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2)",
        params![SCHEMA_VERSION, now_ms],
    )?;
    tx.commit()?;
    Ok(())
}
