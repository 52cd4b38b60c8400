#![forbid(unsafe_code)]

use super::dao::EntityOp;
use super::{StoreError, now_ms};
use ppod_core::model::{Entity, Study};
use ppod_core::{EntityKind, ExternalId, ReconcileReport};
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudySummary {
    pub external_id: ExternalId,
    pub label: String,
    pub version: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityLogEntry {
    pub seq: i64,
    pub version: i64,
    pub op: EntityOp,
    pub kind: EntityKind,
    pub external_id: ExternalId,
}

pub(super) fn load_study_conn(
    conn: &Connection,
    external_id: &ExternalId,
) -> Result<Option<Study>, StoreError> {
    let body = conn
        .query_row(
            "SELECT body_json FROM studies WHERE external_id=?1",
            params![external_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

pub(super) fn save_study_conn(conn: &Connection, study: &Study) -> Result<(), StoreError> {
    let version = study
        .version()
        .ok_or(StoreError::InvalidInput("study has not been stamped"))?;
    let body = serde_json::to_string(study)?;
    let now_ms = now_ms();
    conn.execute(
        r#"
        INSERT INTO studies(external_id, label, version, body_json, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT(external_id) DO UPDATE SET
          label=excluded.label,
          version=excluded.version,
          body_json=excluded.body_json,
          updated_at_ms=excluded.updated_at_ms
        "#,
        params![
            study.id().as_str(),
            study.label(),
            version.number(),
            body,
            now_ms
        ],
    )?;
    Ok(())
}

/// Stores the namespaces and attachment types first created in this session.
pub(super) fn save_vocabulary_conn(
    conn: &Connection,
    report: &ReconcileReport,
) -> Result<(), StoreError> {
    for namespace in &report.new_namespaces {
        conn.execute(
            "INSERT INTO attachment_namespaces(label, external_id, version) VALUES (?1, ?2, ?3)",
            params![
                namespace.label(),
                namespace.id().as_str(),
                report.version.number()
            ],
        )?;
    }
    for attachment_type in &report.new_attachment_types {
        conn.execute(
            "INSERT INTO attachment_types(namespace, label, external_id, version) VALUES (?1, ?2, ?3, ?4)",
            params![
                attachment_type.namespace(),
                attachment_type.label(),
                attachment_type.id().as_str(),
                report.version.number()
            ],
        )?;
    }
    Ok(())
}

pub(super) fn list_studies_conn(conn: &Connection) -> Result<Vec<StudySummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT external_id, label, version, updated_at_ms FROM studies \
         ORDER BY label ASC, external_id ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(StudySummary {
            external_id: ExternalId::try_new(row.get::<_, String>(0)?)
                .map_err(|_| StoreError::InvalidInput("invalid study row"))?,
            label: row.get(1)?,
            version: row.get(2)?,
            updated_at_ms: row.get(3)?,
        });
    }
    Ok(out)
}

pub(super) fn entity_log_since_conn(
    conn: &Connection,
    version: i64,
) -> Result<Vec<EntityLogEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT seq, version, op, kind, external_id FROM entity_log \
         WHERE version > ?1 ORDER BY seq ASC",
    )?;
    let mut rows = stmt.query(params![version])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let op = row.get::<_, String>(2)?;
        let kind = row.get::<_, String>(3)?;
        out.push(EntityLogEntry {
            seq: row.get(0)?,
            version: row.get(1)?,
            op: EntityOp::parse(&op)
                .ok_or(StoreError::InvalidInput("invalid entity_log op"))?,
            kind: EntityKind::parse(&kind)
                .ok_or(StoreError::InvalidInput("invalid entity_log kind"))?,
            external_id: ExternalId::try_new(row.get::<_, String>(4)?)
                .map_err(|_| StoreError::InvalidInput("invalid entity_log row"))?,
        });
    }
    Ok(out)
}
