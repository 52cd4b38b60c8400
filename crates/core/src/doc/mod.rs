#![forbid(unsafe_code)]

//! Incoming documents: the plain values a client submits for merging.

mod export;

pub use export::export_study;

use crate::align::Incoming;
use crate::ids::ExternalId;
use crate::model::CellType;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocStudy {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub otu_sets: Vec<DocOtuSet>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocOtuSet {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub description: Option<String>,
    pub otus: Vec<DocOtu>,
    pub standard_matrices: Vec<DocStandardMatrix>,
    pub dna_matrices: Vec<DocMolecularMatrix>,
    pub protein_matrices: Vec<DocMolecularMatrix>,
    pub dna_sequence_sets: Vec<DocSequenceSet>,
    pub tree_sets: Vec<DocTreeSet>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocOtu {
    /// Textual identifier the client's Newick strings use for this OTU.
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocStandardMatrix {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub description: Option<String>,
    pub characters: Vec<DocCharacter>,
    /// One entry per OTU of the owning set, in OTU order.
    pub rows: Vec<Option<DocStandardRow>>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocCharacter {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub mesquite_id: Option<String>,
    pub states: Vec<DocState>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocState {
    pub state_number: u32,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocStandardRow {
    pub cells: Vec<DocCell>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocCell {
    /// Wire tag, e.g. `SINGLE`.
    pub cell_type: String,
    pub state_numbers: Vec<u32>,
}

impl DocCell {
    pub fn new(cell_type: CellType, state_numbers: &[u32]) -> Self {
        Self {
            cell_type: cell_type.as_str().to_string(),
            state_numbers: state_numbers.to_vec(),
        }
    }

    pub fn single(state_number: u32) -> Self {
        Self::new(CellType::Single, &[state_number])
    }
}

/// DNA or protein matrix; each row is a symbol string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMolecularMatrix {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub description: Option<String>,
    pub rows: Vec<Option<String>>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocSequenceSet {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub sequences: Vec<Option<DocSequence>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocSequence {
    pub sequence: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub accession: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocTreeSet {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub trees: Vec<DocTree>,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocTree {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: String,
    pub newick: String,
    pub attachments: Vec<DocAttachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocAttachment {
    pub doc_id: Option<String>,
    pub external_id: Option<ExternalId>,
    pub label: Option<String>,
    pub string_value: Option<String>,
    pub bytes_value: Option<Vec<u8>>,
    pub attachment_type: Option<DocAttachmentType>,
}

impl DocAttachment {
    pub fn new(namespace: &str, attachment_type: &str, string_value: &str) -> Self {
        Self {
            string_value: Some(string_value.to_string()),
            attachment_type: Some(DocAttachmentType {
                label: attachment_type.to_string(),
                namespace: Some(DocAttachmentNamespace {
                    label: namespace.to_string(),
                }),
            }),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocAttachmentType {
    pub label: String,
    pub namespace: Option<DocAttachmentNamespace>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocAttachmentNamespace {
    pub label: String,
}

macro_rules! incoming {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Incoming for $ty {
                fn external_id(&self) -> Option<&ExternalId> {
                    self.external_id.as_ref()
                }

                fn doc_id(&self) -> Option<&str> {
                    self.doc_id.as_deref()
                }
            }
        )+
    };
}

incoming!(
    DocStudy,
    DocOtuSet,
    DocOtu,
    DocStandardMatrix,
    DocCharacter,
    DocMolecularMatrix,
    DocSequenceSet,
    DocTreeSet,
    DocTree,
    DocAttachment,
);
