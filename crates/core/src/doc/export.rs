#![forbid(unsafe_code)]

use super::{
    DocAttachment, DocAttachmentNamespace, DocAttachmentType, DocCell, DocCharacter,
    DocMolecularMatrix, DocOtu, DocOtuSet, DocSequence, DocSequenceSet, DocStandardMatrix,
    DocStandardRow, DocState, DocStudy, DocTree, DocTreeSet,
};
use crate::model::{
    Attachment, Cell, Entity, Matrix, Molecular, Otu, OtuSet, StandardMatrix, Study,
};
use crate::symbols::render_row;

/// Renders a persisted study as an incoming document.
///
/// Every entity carries its external id, and OTUs use their external id as
/// their textual id, so merging the result back changes nothing.
pub fn export_study(study: &Study) -> DocStudy {
    DocStudy {
        doc_id: None,
        external_id: Some(study.id().clone()),
        label: study.label().to_string(),
        otu_sets: study.otu_sets().iter().map(export_otu_set).collect(),
        attachments: export_attachments(study.attachments()),
    }
}

fn export_otu_set(otu_set: &OtuSet) -> DocOtuSet {
    let otus = otu_set.otus();
    DocOtuSet {
        doc_id: None,
        external_id: Some(otu_set.id().clone()),
        label: otu_set.label().to_string(),
        description: otu_set.description().map(str::to_string),
        otus: otus.iter().map(export_otu).collect(),
        standard_matrices: otu_set
            .standard_matrices()
            .iter()
            .map(|matrix| export_standard_matrix(otu_set, matrix))
            .collect(),
        dna_matrices: otu_set
            .dna_matrices()
            .iter()
            .map(|matrix| export_molecular_matrix(otus, matrix))
            .collect(),
        protein_matrices: otu_set
            .protein_matrices()
            .iter()
            .map(|matrix| export_molecular_matrix(otus, matrix))
            .collect(),
        dna_sequence_sets: otu_set
            .dna_sequence_sets()
            .iter()
            .map(|sequence_set| DocSequenceSet {
                doc_id: None,
                external_id: Some(sequence_set.id().clone()),
                label: sequence_set.label().to_string(),
                sequences: otus
                    .iter()
                    .map(|otu| {
                        sequence_set.sequence(otu.id()).map(|sequence| DocSequence {
                            sequence: sequence.sequence().to_string(),
                            name: sequence.name().map(str::to_string),
                            description: sequence.description().map(str::to_string),
                            accession: sequence.accession().map(str::to_string),
                        })
                    })
                    .collect(),
            })
            .collect(),
        tree_sets: otu_set
            .tree_sets()
            .iter()
            .map(|tree_set| DocTreeSet {
                doc_id: None,
                external_id: Some(tree_set.id().clone()),
                label: tree_set.label().to_string(),
                trees: tree_set
                    .trees()
                    .iter()
                    .map(|tree| DocTree {
                        doc_id: None,
                        external_id: Some(tree.id().clone()),
                        label: tree.label().to_string(),
                        newick: tree.newick().to_string(),
                        attachments: export_attachments(tree.attachments()),
                    })
                    .collect(),
                attachments: export_attachments(tree_set.attachments()),
            })
            .collect(),
        attachments: export_attachments(otu_set.attachments()),
    }
}

fn export_otu(otu: &Otu) -> DocOtu {
    DocOtu {
        doc_id: Some(otu.id().to_string()),
        external_id: Some(otu.id().clone()),
        label: otu.label().to_string(),
        attachments: export_attachments(otu.attachments()),
    }
}

fn export_standard_matrix(otu_set: &OtuSet, matrix: &StandardMatrix) -> DocStandardMatrix {
    let characters = matrix
        .characters()
        .iter()
        .filter_map(|id| otu_set.character(id))
        .map(|character| DocCharacter {
            doc_id: None,
            external_id: Some(character.id().clone()),
            label: character.label().to_string(),
            mesquite_id: character.mesquite_id().map(str::to_string),
            states: character
                .states()
                .map(|state| DocState {
                    state_number: state.state_number(),
                    label: state.label().to_string(),
                })
                .collect(),
            attachments: export_attachments(character.attachments()),
        })
        .collect();

    let rows = otu_set
        .otus()
        .iter()
        .map(|otu| {
            matrix.row(otu.id()).map(|row| DocStandardRow {
                cells: row
                    .cells()
                    .iter()
                    .map(|cell| DocCell {
                        cell_type: cell.cell_type().as_str().to_string(),
                        state_numbers: cell.elements().iter().map(|state| state.0).collect(),
                    })
                    .collect(),
            })
        })
        .collect();

    DocStandardMatrix {
        doc_id: None,
        external_id: Some(matrix.id().clone()),
        label: matrix.label().to_string(),
        description: matrix.description().map(str::to_string),
        characters,
        rows,
        attachments: export_attachments(matrix.attachments()),
    }
}

fn export_molecular_matrix<E: Molecular>(otus: &[Otu], matrix: &Matrix<E>) -> DocMolecularMatrix {
    DocMolecularMatrix {
        doc_id: None,
        external_id: Some(matrix.id().clone()),
        label: matrix.label().to_string(),
        description: matrix.description().map(str::to_string),
        rows: otus
            .iter()
            .map(|otu| {
                matrix
                    .row(otu.id())
                    .map(|row| render_row(row.cells().iter().map(Cell::value)))
            })
            .collect(),
        attachments: export_attachments(matrix.attachments()),
    }
}

fn export_attachments(attachments: &[Attachment]) -> Vec<DocAttachment> {
    attachments
        .iter()
        .map(|attachment| {
            let attachment_type = attachment.attachment_type();
            DocAttachment {
                doc_id: None,
                external_id: Some(attachment.id().clone()),
                label: attachment.label().map(str::to_string),
                string_value: attachment.string_value().map(str::to_string),
                bytes_value: attachment.bytes_value().map(<[u8]>::to_vec),
                attachment_type: Some(DocAttachmentType {
                    label: attachment_type.label.clone(),
                    namespace: Some(DocAttachmentNamespace {
                        label: attachment_type.namespace.clone(),
                    }),
                }),
            }
        })
        .collect()
}
