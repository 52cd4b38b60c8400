#![forbid(unsafe_code)]

use ppod_core::model::{AttachmentNamespace, AttachmentType, Versioned};
use ppod_core::{Dao, DaoError, EntityHandle, ExternalId, Version};
use rusqlite::{OptionalExtension, Transaction, params};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityOp {
    Persist,
    Delete,
}

impl EntityOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persist => "persist",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "persist" => Some(Self::Persist),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for EntityOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Dao` over an open transaction. Every persist and delete is journaled in
/// `entity_log` under the session version; nothing is written elsewhere
/// until the study snapshot is saved.
pub(super) struct TxDao<'a, 'conn> {
    tx: &'a Transaction<'conn>,
    version: Version,
}

impl<'a, 'conn> TxDao<'a, 'conn> {
    pub(super) fn new(tx: &'a Transaction<'conn>, version: Version) -> Self {
        Self { tx, version }
    }

    fn journal(&self, op: EntityOp, entity: &EntityHandle) -> Result<(), DaoError> {
        self.tx
            .execute(
                "INSERT INTO entity_log(version, op, kind, external_id) VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.version.number(),
                    op.as_str(),
                    entity.kind.as_str(),
                    entity.external_id.as_str(),
                ],
            )
            .map_err(DaoError::backend)?;
        Ok(())
    }
}

impl Dao for TxDao<'_, '_> {
    fn make_persistent(&mut self, entity: &EntityHandle) -> Result<(), DaoError> {
        self.journal(EntityOp::Persist, entity)
    }

    fn make_transient(&mut self, entity: &EntityHandle) -> Result<(), DaoError> {
        self.journal(EntityOp::Delete, entity)
    }

    fn flush(&mut self) -> Result<(), DaoError> {
        Ok(())
    }

    fn evict(&mut self, _entities: &[EntityHandle]) -> Result<(), DaoError> {
        Ok(())
    }

    fn namespace_by_label(&mut self, label: &str) -> Result<Option<AttachmentNamespace>, DaoError> {
        let row = self
            .tx
            .query_row(
                "SELECT n.external_id, n.version, v.created_at_ms \
                 FROM attachment_namespaces n JOIN versions v ON v.number = n.version \
                 WHERE n.label=?1",
                params![label],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(DaoError::backend)?;

        row.map(|(external_id, number, created_at_ms)| {
            Ok(AttachmentNamespace::from_parts(
                persisted_meta(external_id, number, created_at_ms)?,
                label.to_string(),
            ))
        })
        .transpose()
    }

    fn attachment_type_by_label(
        &mut self,
        namespace: &str,
        label: &str,
    ) -> Result<Option<AttachmentType>, DaoError> {
        let row = self
            .tx
            .query_row(
                "SELECT t.external_id, t.version, v.created_at_ms \
                 FROM attachment_types t JOIN versions v ON v.number = t.version \
                 WHERE t.namespace=?1 AND t.label=?2",
                params![namespace, label],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(DaoError::backend)?;

        row.map(|(external_id, number, created_at_ms)| {
            Ok(AttachmentType::from_parts(
                persisted_meta(external_id, number, created_at_ms)?,
                namespace.to_string(),
                label.to_string(),
            ))
        })
        .transpose()
    }
}

fn persisted_meta(
    external_id: String,
    number: i64,
    created_at_ms: i64,
) -> Result<Versioned, DaoError> {
    let external_id = ExternalId::try_new(external_id)
        .map_err(|err| DaoError::rejected(format!("stored external id: {}", err.message())))?;
    Ok(Versioned::persisted(
        external_id,
        Version::new(number, created_at_ms),
    ))
}
