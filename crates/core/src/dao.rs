#![forbid(unsafe_code)]

use crate::error::DaoError;
use crate::ids::ExternalId;
use crate::model::{AttachmentNamespace, AttachmentType, Versioned};
use crate::version::Version;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Study,
    OtuSet,
    Otu,
    StandardMatrix,
    DnaMatrix,
    ProteinMatrix,
    Character,
    CharacterState,
    Row,
    Cell,
    DnaSequenceSet,
    Sequence,
    TreeSet,
    Tree,
    Attachment,
    AttachmentNamespace,
    AttachmentType,
}

impl EntityKind {
    pub const ALL: [EntityKind; 17] = [
        Self::Study,
        Self::OtuSet,
        Self::Otu,
        Self::StandardMatrix,
        Self::DnaMatrix,
        Self::ProteinMatrix,
        Self::Character,
        Self::CharacterState,
        Self::Row,
        Self::Cell,
        Self::DnaSequenceSet,
        Self::Sequence,
        Self::TreeSet,
        Self::Tree,
        Self::Attachment,
        Self::AttachmentNamespace,
        Self::AttachmentType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::OtuSet => "otu_set",
            Self::Otu => "otu",
            Self::StandardMatrix => "standard_matrix",
            Self::DnaMatrix => "dna_matrix",
            Self::ProteinMatrix => "protein_matrix",
            Self::Character => "character",
            Self::CharacterState => "character_state",
            Self::Row => "row",
            Self::Cell => "cell",
            Self::DnaSequenceSet => "dna_sequence_set",
            Self::Sequence => "sequence",
            Self::TreeSet => "tree_set",
            Self::Tree => "tree",
            Self::Attachment => "attachment",
            Self::AttachmentNamespace => "attachment_namespace",
            Self::AttachmentType => "attachment_type",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// What the persistence collaborator sees of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityHandle {
    pub kind: EntityKind,
    pub external_id: ExternalId,
    pub version: Option<Version>,
}

impl EntityHandle {
    pub fn new(kind: EntityKind, meta: &Versioned) -> Self {
        Self {
            kind,
            external_id: meta.external_id().clone(),
            version: meta.version(),
        }
    }
}

/// Persistence collaborator driven by the reconciler.
///
/// The reconciler never reads entities back through this trait except for the
/// attachment vocabulary lookups, which default to "nothing persisted".
pub trait Dao {
    fn make_persistent(&mut self, entity: &EntityHandle) -> Result<(), DaoError>;

    fn make_transient(&mut self, entity: &EntityHandle) -> Result<(), DaoError>;

    fn flush(&mut self) -> Result<(), DaoError>;

    fn evict(&mut self, entities: &[EntityHandle]) -> Result<(), DaoError>;

    fn namespace_by_label(&mut self, _label: &str) -> Result<Option<AttachmentNamespace>, DaoError> {
        Ok(None)
    }

    fn attachment_type_by_label(
        &mut self,
        _namespace: &str,
        _label: &str,
    ) -> Result<Option<AttachmentType>, DaoError> {
        Ok(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DaoCall {
    MakePersistent(EntityHandle),
    MakeTransient(EntityHandle),
    Flush,
    Evict(Vec<EntityHandle>),
}

/// In-memory `Dao` that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingDao {
    pub calls: Vec<DaoCall>,
    namespaces: BTreeMap<String, AttachmentNamespace>,
    attachment_types: BTreeMap<(String, String), AttachmentType>,
}

impl RecordingDao {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends `namespace` is already persisted.
    pub fn with_namespace(mut self, namespace: AttachmentNamespace) -> Self {
        self.namespaces
            .insert(namespace.label().to_string(), namespace);
        self
    }

    /// Pretends `attachment_type` is already persisted.
    pub fn with_attachment_type(mut self, attachment_type: AttachmentType) -> Self {
        self.attachment_types.insert(
            (
                attachment_type.namespace().to_string(),
                attachment_type.label().to_string(),
            ),
            attachment_type,
        );
        self
    }

    pub fn persisted(&self, kind: EntityKind) -> Vec<&EntityHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DaoCall::MakePersistent(handle) if handle.kind == kind => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, kind: EntityKind) -> Vec<&EntityHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DaoCall::MakeTransient(handle) if handle.kind == kind => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DaoCall::Flush))
            .count()
    }

    pub fn evicted(&self) -> usize {
        self.calls
            .iter()
            .map(|call| match call {
                DaoCall::Evict(handles) => handles.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Dao for RecordingDao {
    fn make_persistent(&mut self, entity: &EntityHandle) -> Result<(), DaoError> {
        self.calls.push(DaoCall::MakePersistent(entity.clone()));
        Ok(())
    }

    fn make_transient(&mut self, entity: &EntityHandle) -> Result<(), DaoError> {
        self.calls.push(DaoCall::MakeTransient(entity.clone()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DaoError> {
        self.calls.push(DaoCall::Flush);
        Ok(())
    }

    fn evict(&mut self, entities: &[EntityHandle]) -> Result<(), DaoError> {
        self.calls.push(DaoCall::Evict(entities.to_vec()));
        Ok(())
    }

    fn namespace_by_label(&mut self, label: &str) -> Result<Option<AttachmentNamespace>, DaoError> {
        Ok(self.namespaces.get(label).cloned())
    }

    fn attachment_type_by_label(
        &mut self,
        namespace: &str,
        label: &str,
    ) -> Result<Option<AttachmentType>, DaoError> {
        Ok(self
            .attachment_types
            .get(&(namespace.to_string(), label.to_string()))
            .cloned())
    }
}
