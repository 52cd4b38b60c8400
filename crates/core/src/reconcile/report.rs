#![forbid(unsafe_code)]

use crate::dao::EntityKind;
use crate::ids::ExternalId;
use crate::model::{AttachmentNamespace, AttachmentType, Otu};
use crate::version::Version;
use std::collections::BTreeMap;

/// New external id handed out for a document-local id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignedId {
    pub kind: EntityKind,
    pub doc_id: String,
    pub external_id: ExternalId,
}

/// Summary of one reconciliation session.
#[derive(Clone, Debug)]
pub struct ReconcileReport {
    pub version: Version,
    pub created: BTreeMap<EntityKind, usize>,
    pub deleted: BTreeMap<EntityKind, usize>,
    /// Entities that received `version` in this session.
    pub stamped: usize,
    pub assigned_ids: Vec<AssignedId>,
    pub new_namespaces: Vec<AttachmentNamespace>,
    pub new_attachment_types: Vec<AttachmentType>,
    /// OTUs removed from their set, detached from it.
    pub removed_otus: Vec<Otu>,
}

impl ReconcileReport {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            created: BTreeMap::new(),
            deleted: BTreeMap::new(),
            stamped: 0,
            assigned_ids: Vec::new(),
            new_namespaces: Vec::new(),
            new_attachment_types: Vec::new(),
            removed_otus: Vec::new(),
        }
    }

    pub fn created(&self, kind: EntityKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn deleted(&self, kind: EntityKind) -> usize {
        self.deleted.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    pub fn assigned_id(&self, doc_id: &str) -> Option<&ExternalId> {
        self.assigned_ids
            .iter()
            .find(|assigned| assigned.doc_id == doc_id)
            .map(|assigned| &assigned.external_id)
    }

    pub(crate) fn count_created(&mut self, kind: EntityKind) {
        *self.created.entry(kind).or_default() += 1;
    }

    pub(crate) fn count_deleted(&mut self, kind: EntityKind) {
        *self.deleted.entry(kind).or_default() += 1;
    }
}
