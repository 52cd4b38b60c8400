#![forbid(unsafe_code)]

use super::attachment::Attachment;
use super::cell::Cell;
use super::element::{Element, Nucleotide, Residue, StateNumber};
use super::keyed::OtuKeyedMap;
use super::meta::{Entity, Identified, Versioned, entity, set_field};
use crate::dao::EntityKind;
use crate::ids::ExternalId;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterState {
    pub(crate) meta: Versioned,
    state_number: u32,
    label: String,
}

entity!(CharacterState, EntityKind::CharacterState);

impl CharacterState {
    pub fn new(state_number: u32, label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            state_number,
            label: label.into(),
        }
    }

    pub fn state_number(&self) -> u32 {
        self.state_number
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }
}

/// A column of a standard matrix. Lives in the OTU set's character pool and
/// may be shared by several matrices of that set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    pub(crate) meta: Versioned,
    label: String,
    mesquite_id: Option<String>,
    pub(crate) states: BTreeMap<u32, CharacterState>,
    pub(crate) matrices: BTreeSet<ExternalId>,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(Character, EntityKind::Character);

impl Character {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            mesquite_id: None,
            states: BTreeMap::new(),
            matrices: BTreeSet::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mesquite_id(&self) -> Option<&str> {
        self.mesquite_id.as_deref()
    }

    pub fn state(&self, state_number: u32) -> Option<&CharacterState> {
        self.states.get(&state_number)
    }

    pub fn states(&self) -> impl Iterator<Item = &CharacterState> {
        self.states.values()
    }

    /// Matrices currently using this character.
    pub fn matrices(&self) -> &BTreeSet<ExternalId> {
        &self.matrices
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }

    pub fn set_mesquite_id(&mut self, mesquite_id: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.mesquite_id, mesquite_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Row<E: Ord> {
    pub(crate) meta: Versioned,
    pub(crate) cells: Vec<Cell<E>>,
}

impl<E: Element> Identified for Row<E> {
    fn external_id(&self) -> Option<&ExternalId> {
        Some(self.meta.external_id())
    }
}

impl<E: Element> Entity for Row<E> {
    const KIND: EntityKind = EntityKind::Row;

    fn meta(&self) -> &Versioned {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Versioned {
        &mut self.meta
    }
}

impl<E: Element> Default for Row<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element> Row<E> {
    pub fn new() -> Self {
        Self {
            meta: Versioned::fresh(),
            cells: Vec::new(),
        }
    }

    pub fn cells(&self) -> &[Cell<E>] {
        &self.cells
    }
}

/// A character matrix over one OTU set, generic over the cell element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Matrix<E: Ord> {
    pub(crate) meta: Versioned,
    label: String,
    description: Option<String>,
    /// Column characters, standard matrices only.
    pub(crate) characters: Vec<ExternalId>,
    pub(crate) column_versions: Vec<Option<Version>>,
    pub(crate) rows: OtuKeyedMap<Row<E>>,
    pub(crate) attachments: Vec<Attachment>,
}

pub type StandardMatrix = Matrix<StateNumber>;
pub type DnaMatrix = Matrix<Nucleotide>;
pub type ProteinMatrix = Matrix<Residue>;

impl<E: Element> Identified for Matrix<E> {
    fn external_id(&self) -> Option<&ExternalId> {
        Some(self.meta.external_id())
    }
}

impl<E: Element> Entity for Matrix<E> {
    const KIND: EntityKind = E::MATRIX_KIND;

    fn meta(&self) -> &Versioned {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Versioned {
        &mut self.meta
    }
}

impl<E: Element> Matrix<E> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            description: None,
            characters: Vec::new(),
            column_versions: Vec::new(),
            rows: OtuKeyedMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn characters(&self) -> &[ExternalId] {
        &self.characters
    }

    pub fn column_count(&self) -> usize {
        self.column_versions.len()
    }

    pub fn column_versions(&self) -> &[Option<Version>] {
        &self.column_versions
    }

    pub fn row(&self, otu: &ExternalId) -> Option<&Row<E>> {
        self.rows.get(otu)
    }

    pub fn rows(&self) -> &OtuKeyedMap<Row<E>> {
        &self.rows
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }

    pub fn set_description(&mut self, description: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.description, description)
    }
}
