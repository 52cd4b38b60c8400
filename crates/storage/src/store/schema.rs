#![forbid(unsafe_code)]

use super::{StoreError, now_ms};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

pub(super) const SCHEMA_VERSION: i64 = 1;

const TABLES: [&str; 7] = [
    "store_state",
    "counters",
    "versions",
    "studies",
    "attachment_namespaces",
    "attachment_types",
    "entity_log",
];

/// Refuses a database that already holds tables but is not one of ours.
pub(super) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }
    if TABLES.iter().all(|table| tables.contains(*table)) {
        return Ok(());
    }
    Err(StoreError::InvalidInput(
        "RESET_REQUIRED: storage directory holds an unrecognized database",
    ))
}

pub(super) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS versions (
          number INTEGER PRIMARY KEY,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS studies (
          external_id TEXT PRIMARY KEY,
          label TEXT NOT NULL,
          version INTEGER NOT NULL REFERENCES versions(number),
          body_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attachment_namespaces (
          label TEXT PRIMARY KEY,
          external_id TEXT NOT NULL UNIQUE,
          version INTEGER NOT NULL REFERENCES versions(number)
        );

        CREATE TABLE IF NOT EXISTS attachment_types (
          namespace TEXT NOT NULL REFERENCES attachment_namespaces(label),
          label TEXT NOT NULL,
          external_id TEXT NOT NULL UNIQUE,
          version INTEGER NOT NULL REFERENCES versions(number),
          PRIMARY KEY (namespace, label)
        );

        CREATE TABLE IF NOT EXISTS entity_log (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          version INTEGER NOT NULL REFERENCES versions(number),
          op TEXT NOT NULL,
          kind TEXT NOT NULL,
          external_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entity_log_version ON entity_log(version, seq);
        "#,
    )?;

    let now_ms = now_ms();
    conn.execute(
        "INSERT OR IGNORE INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2)",
        params![SCHEMA_VERSION, now_ms],
    )?;
    Ok(())
}
