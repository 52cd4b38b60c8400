#![forbid(unsafe_code)]

//! Post-order version stamping.
//!
//! Every dirty entity receives the session version. An owner is treated as
//! dirty when any entity it owns carries the session version, so a change
//! anywhere below is visible all the way up to the study.

use crate::model::{Attachment, Element, Matrix, OtuSet, Study, Versioned};
use crate::version::Version;

/// Stamps `study` and everything it owns. Returns how many entities were
/// stamped.
pub fn stamp_study(study: &mut Study, version: Version) -> usize {
    let mut stamper = Stamper {
        version,
        stamped: 0,
    };

    let mut touched = false;
    for otu_set in &mut study.otu_sets {
        touched |= stamper.otu_set(otu_set);
    }
    touched |= stamper.attachments(&mut study.attachments);
    stamper.entity(&mut study.meta, touched);

    stamper.stamped
}

struct Stamper {
    version: Version,
    stamped: usize,
}

impl Stamper {
    fn entity(&mut self, meta: &mut Versioned, child_touched: bool) -> bool {
        if child_touched && !meta.touched_in(self.version) {
            meta.mark_dirty();
        }
        if meta.stamp(self.version) {
            self.stamped += 1;
        }
        meta.touched_in(self.version)
    }

    fn attachments(&mut self, attachments: &mut [Attachment]) -> bool {
        let mut touched = false;
        for attachment in attachments {
            touched |= self.entity(&mut attachment.meta, false);
        }
        touched
    }

    fn otu_set(&mut self, otu_set: &mut OtuSet) -> bool {
        let mut touched = false;

        for otu in &mut otu_set.otus {
            let child = self.attachments(&mut otu.attachments);
            touched |= self.entity(&mut otu.meta, child);
        }

        for character in otu_set.characters.values_mut() {
            let mut child = self.attachments(&mut character.attachments);
            for state in character.states.values_mut() {
                child |= self.entity(&mut state.meta, false);
            }
            touched |= self.entity(&mut character.meta, child);
        }

        for matrix in &mut otu_set.standard_matrices {
            touched |= self.matrix(matrix);
        }
        for matrix in &mut otu_set.dna_matrices {
            touched |= self.matrix(matrix);
        }
        for matrix in &mut otu_set.protein_matrices {
            touched |= self.matrix(matrix);
        }

        for sequence_set in &mut otu_set.dna_sequence_sets {
            let mut child = false;
            for sequence in sequence_set.sequences.values_mut() {
                child |= self.entity(&mut sequence.meta, false);
            }
            touched |= self.entity(&mut sequence_set.meta, child);
        }

        for tree_set in &mut otu_set.tree_sets {
            let mut child = self.attachments(&mut tree_set.attachments);
            for tree in &mut tree_set.trees {
                let tree_child = self.attachments(&mut tree.attachments);
                child |= self.entity(&mut tree.meta, tree_child);
            }
            touched |= self.entity(&mut tree_set.meta, child);
        }

        touched |= self.attachments(&mut otu_set.attachments);
        self.entity(&mut otu_set.meta, touched)
    }

    /// Also fills every unset column version, which marks the matrix.
    fn matrix<E: Element>(&mut self, matrix: &mut Matrix<E>) -> bool {
        let mut touched = self.attachments(&mut matrix.attachments);

        for row in matrix.rows.values_mut() {
            let mut child = false;
            for cell in &mut row.cells {
                child |= self.entity(&mut cell.meta, false);
            }
            touched |= self.entity(&mut row.meta, child);
        }

        for slot in &mut matrix.column_versions {
            if slot.is_none() {
                *slot = Some(self.version);
                touched = true;
            }
        }

        self.entity(&mut matrix.meta, touched)
    }
}
