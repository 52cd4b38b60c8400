#![forbid(unsafe_code)]

use super::Reconciler;
use crate::doc::DocSequenceSet;
use crate::error::ReconcileError;
use crate::ids::ExternalId;
use crate::model::{DnaSequenceSet, Entity, Nucleotide, Otu, Sequence};

impl Reconciler<'_> {
    /// Sequences are matched by OTU. A set whose stored sequences have a
    /// different length than the incoming ones is emptied first.
    pub fn reconcile_sequence_set(
        &mut self,
        otus: &[Otu],
        sequence_set: &mut DnaSequenceSet,
        source: &DocSequenceSet,
    ) -> Result<(), ReconcileError> {
        sequence_set.set_label(source.label.clone());

        if source.sequences.len() != otus.len() {
            return Err(ReconcileError::malformed(format!(
                "sequence set {:?} has {} sequences for {} OTUs",
                source.label,
                source.sequences.len(),
                otus.len()
            )));
        }

        let mut length = None;
        for sequence in source.sequences.iter().flatten() {
            if let Some(bad) = sequence
                .sequence
                .chars()
                .find(|symbol| !Nucleotide::is_sequence_symbol(*symbol))
            {
                return Err(ReconcileError::malformed(format!(
                    "sequence set {:?} contains invalid symbol {bad:?}",
                    source.label
                )));
            }
            let current = sequence.sequence.chars().count();
            match length {
                None => length = Some(current),
                Some(expected) if expected != current => {
                    return Err(ReconcileError::malformed(format!(
                        "sequences of set {:?} differ in length ({expected} and {current})",
                        source.label
                    )));
                }
                Some(_) => {}
            }
        }

        let otu_ids: Vec<ExternalId> = otus.iter().map(|otu| otu.id().clone()).collect();
        for stale in sequence_set.sequences.sync_keys(&otu_ids) {
            self.orphan(&stale)?;
            sequence_set.meta.mark_dirty();
        }
        if let (Some(stored), Some(incoming)) = (sequence_set.sequence_length(), length) {
            if stored != incoming {
                for stale in sequence_set.sequences.drain_values() {
                    self.orphan(&stale)?;
                }
                sequence_set.meta.mark_dirty();
            }
        }

        for (otu_id, source) in otu_ids.iter().zip(&source.sequences) {
            let Some(doc) = source else {
                if let Some(stale) = sequence_set.sequences.take(otu_id) {
                    self.orphan(&stale)?;
                    sequence_set.meta.mark_dirty();
                }
                continue;
            };

            let (mut sequence, is_new) = match sequence_set.sequences.take(otu_id) {
                Some(sequence) => (sequence, false),
                None => {
                    let sequence = Sequence::new();
                    self.created(&sequence, None)?;
                    sequence_set.meta.mark_dirty();
                    (sequence, true)
                }
            };
            sequence.set_sequence(doc.sequence.clone());
            sequence.set_name(doc.name.clone());
            sequence.set_description(doc.description.clone());
            sequence.set_accession(doc.accession.clone());

            let needs_update = !is_new && sequence.meta.is_dirty();
            if sequence.meta.stamp(self.version) {
                self.report.stamped += 1;
            }
            if needs_update {
                self.dao.make_persistent(&sequence.handle())?;
            }

            let handle = sequence.handle();
            sequence_set.sequences.put(otu_id.clone(), Some(sequence));
            self.row_done([handle])?;
        }

        self.flush_rows()
    }
}
