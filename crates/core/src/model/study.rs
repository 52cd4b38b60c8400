#![forbid(unsafe_code)]

use super::attachment::Attachment;
use super::keyed::OtuKeyedMap;
use super::matrix::{Character, DnaMatrix, ProteinMatrix, StandardMatrix};
use super::meta::{Versioned, entity, set_field};
use crate::dao::EntityKind;
use crate::ids::ExternalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Otu {
    pub(crate) meta: Versioned,
    label: String,
    /// Owning OTU set; cleared when the OTU is orphaned.
    pub(crate) parent: Option<ExternalId>,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(Otu, EntityKind::Otu);

impl Otu {
    pub fn new(label: impl Into<String>, parent: ExternalId) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            parent: Some(parent),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&ExternalId> {
        self.parent.as_ref()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sequence {
    pub(crate) meta: Versioned,
    sequence: String,
    name: Option<String>,
    description: Option<String>,
    accession: Option<String>,
}

entity!(Sequence, EntityKind::Sequence);

impl Sequence {
    pub fn new() -> Self {
        Self {
            meta: Versioned::fresh(),
            sequence: String::new(),
            name: None,
            description: None,
            accession: None,
        }
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn accession(&self) -> Option<&str> {
        self.accession.as_deref()
    }

    pub fn set_sequence(&mut self, sequence: String) -> bool {
        set_field(&mut self.meta, &mut self.sequence, sequence)
    }

    pub fn set_name(&mut self, name: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.name, name)
    }

    pub fn set_description(&mut self, description: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.description, description)
    }

    pub fn set_accession(&mut self, accession: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.accession, accession)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DnaSequenceSet {
    pub(crate) meta: Versioned,
    label: String,
    pub(crate) sequences: OtuKeyedMap<Sequence>,
}

entity!(DnaSequenceSet, EntityKind::DnaSequenceSet);

impl DnaSequenceSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            sequences: OtuKeyedMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sequence(&self, otu: &ExternalId) -> Option<&Sequence> {
        self.sequences.get(otu)
    }

    pub fn sequences(&self) -> &OtuKeyedMap<Sequence> {
        &self.sequences
    }

    /// Common length of the stored sequences, if any is stored.
    pub fn sequence_length(&self) -> Option<usize> {
        self.sequences
            .values()
            .next()
            .map(|sequence| sequence.sequence().chars().count())
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tree {
    pub(crate) meta: Versioned,
    label: String,
    newick: String,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(Tree, EntityKind::Tree);

impl Tree {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            newick: String::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn newick(&self) -> &str {
        &self.newick
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }

    pub fn set_newick(&mut self, newick: String) -> bool {
        set_field(&mut self.meta, &mut self.newick, newick)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeSet {
    pub(crate) meta: Versioned,
    label: String,
    pub(crate) trees: Vec<Tree>,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(TreeSet, EntityKind::TreeSet);

impl TreeSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            trees: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtuSet {
    pub(crate) meta: Versioned,
    label: String,
    description: Option<String>,
    pub(crate) otus: Vec<Otu>,
    /// Characters used by the standard matrices of this set, by external id.
    pub(crate) characters: BTreeMap<ExternalId, Character>,
    pub(crate) standard_matrices: Vec<StandardMatrix>,
    pub(crate) dna_matrices: Vec<DnaMatrix>,
    pub(crate) protein_matrices: Vec<ProteinMatrix>,
    pub(crate) dna_sequence_sets: Vec<DnaSequenceSet>,
    pub(crate) tree_sets: Vec<TreeSet>,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(OtuSet, EntityKind::OtuSet);

impl OtuSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            description: None,
            otus: Vec::new(),
            characters: BTreeMap::new(),
            standard_matrices: Vec::new(),
            dna_matrices: Vec::new(),
            protein_matrices: Vec::new(),
            dna_sequence_sets: Vec::new(),
            tree_sets: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn otus(&self) -> &[Otu] {
        &self.otus
    }

    pub fn otu_ids(&self) -> Vec<ExternalId> {
        self.otus
            .iter()
            .map(|otu| otu.meta.external_id().clone())
            .collect()
    }

    pub fn character(&self, external_id: &ExternalId) -> Option<&Character> {
        self.characters.get(external_id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn standard_matrices(&self) -> &[StandardMatrix] {
        &self.standard_matrices
    }

    pub fn dna_matrices(&self) -> &[DnaMatrix] {
        &self.dna_matrices
    }

    pub fn protein_matrices(&self) -> &[ProteinMatrix] {
        &self.protein_matrices
    }

    pub fn dna_sequence_sets(&self) -> &[DnaSequenceSet] {
        &self.dna_sequence_sets
    }

    pub fn tree_sets(&self) -> &[TreeSet] {
        &self.tree_sets
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

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Study {
    pub(crate) meta: Versioned,
    label: String,
    pub(crate) otu_sets: Vec<OtuSet>,
    pub(crate) attachments: Vec<Attachment>,
}

entity!(Study, EntityKind::Study);

impl Study {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
            otu_sets: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn otu_sets(&self) -> &[OtuSet] {
        &self.otu_sets
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn set_label(&mut self, label: String) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }
}
