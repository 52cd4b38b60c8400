#![forbid(unsafe_code)]

use super::{StoreError, now_ms};
use ppod_core::Version;
use rusqlite::{OptionalExtension, Transaction, params};

const VERSION_COUNTER: &str = "version";

pub(super) fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current
        .checked_add(1)
        .ok_or(StoreError::InvalidInput("counter overflow"))?;
    tx.execute(
        r#"
        INSERT INTO counters(name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value=excluded.value
        "#,
        params![name, next],
    )?;
    Ok(next)
}

/// Allocates the next version and records it.
pub(super) fn next_version_tx(tx: &Transaction<'_>) -> Result<Version, StoreError> {
    let number = next_counter_tx(tx, VERSION_COUNTER)?;
    let version = Version::new(number, now_ms());
    tx.execute(
        "INSERT INTO versions(number, created_at_ms) VALUES (?1, ?2)",
        params![version.number(), version.created_at_ms()],
    )?;
    Ok(version)
}
