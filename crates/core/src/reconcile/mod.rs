#![forbid(unsafe_code)]

//! Create-or-update merge of an incoming document onto a persisted study.

mod attachment;
mod matrix;
mod report;
mod sequence;
mod tree;

pub use report::{AssignedId, ReconcileReport};
pub use tree::rewrite_newick;

use crate::align::{Incoming, align_by_id};
use crate::config::{ReconcileConfig, UnknownIdPolicy};
use crate::dao::{Dao, EntityHandle, EntityKind};
use crate::doc::{
    DocMolecularMatrix, DocOtu, DocOtuSet, DocSequenceSet, DocStandardMatrix, DocStudy, DocTreeSet,
};
use crate::error::ReconcileError;
use crate::ids::ExternalId;
use crate::model::{
    AttachmentNamespace, AttachmentType, DnaMatrix, DnaSequenceSet, Entity, Nucleotide, Otu,
    OtuSet, ProteinMatrix, Residue, StandardMatrix, Study, TreeSet,
};
use crate::stamp::stamp_study;
use crate::version::{Version, VersionSource};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One reconciliation session: a single version token, a single DAO, and the
/// attachment vocabulary seen so far.
pub struct Reconciler<'a> {
    config: ReconcileConfig,
    version: Version,
    dao: &'a mut dyn Dao,
    namespaces: BTreeMap<String, AttachmentNamespace>,
    attachment_types: BTreeMap<(String, String), AttachmentType>,
    report: ReconcileReport,
    rows_since_flush: usize,
    pending_evictions: Vec<EntityHandle>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: ReconcileConfig, version: Version, dao: &'a mut dyn Dao) -> Self {
        Self {
            config,
            version,
            dao,
            namespaces: BTreeMap::new(),
            attachment_types: BTreeMap::new(),
            report: ReconcileReport::new(version),
            rows_since_flush: 0,
            pending_evictions: Vec::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    pub fn reconcile_study(
        &mut self,
        study: &mut Study,
        source: &DocStudy,
    ) -> Result<(), ReconcileError> {
        study.set_label(source.label.clone());

        let (changed, orphaned) =
            self.align_owned(&mut study.otu_sets, &source.otu_sets, |doc: &DocOtuSet| {
                OtuSet::new(doc.label.clone())
            })?;
        for otu_set in &orphaned {
            self.orphan(otu_set)?;
        }
        if changed {
            study.meta.mark_dirty();
        }

        for (otu_set, doc) in study.otu_sets.iter_mut().zip(&source.otu_sets) {
            self.reconcile_otu_set(otu_set, doc)?;
        }

        if self.merge_attachments(&mut study.attachments, &source.attachments)? {
            study.meta.mark_dirty();
        }
        Ok(())
    }

    /// Aligns OTUs first; every matrix, sequence set and tree set of the set
    /// is then reconciled against that final OTU order.
    pub fn reconcile_otu_set(
        &mut self,
        otu_set: &mut OtuSet,
        source: &DocOtuSet,
    ) -> Result<(), ReconcileError> {
        otu_set.set_label(source.label.clone());
        otu_set.set_description(source.description.clone());

        let mut labels = BTreeSet::new();
        for otu in &source.otus {
            if !labels.insert(otu.label.as_str()) {
                return Err(ReconcileError::malformed(format!(
                    "OTU label {:?} is used more than once in OTU set {:?}",
                    otu.label, source.label
                )));
            }
        }

        let parent = otu_set.id().clone();
        let (changed, orphaned) = self.align_owned(&mut otu_set.otus, &source.otus, |doc: &DocOtu| {
            Otu::new(doc.label.clone(), parent.clone())
        })?;
        for mut otu in orphaned {
            otu.parent = None;
            self.orphan(&otu)?;
            self.report.removed_otus.push(otu);
        }
        if changed {
            otu_set.meta.mark_dirty();
        }
        for (otu, doc) in otu_set.otus.iter_mut().zip(&source.otus) {
            otu.set_label(doc.label.clone());
            if self.merge_attachments(&mut otu.attachments, &doc.attachments)? {
                otu.meta.mark_dirty();
            }
        }

        let (changed, orphaned) = self.align_owned(
            &mut otu_set.standard_matrices,
            &source.standard_matrices,
            |doc: &DocStandardMatrix| StandardMatrix::new(doc.label.clone()),
        )?;
        for (matrix, doc) in otu_set
            .standard_matrices
            .iter_mut()
            .zip(&source.standard_matrices)
        {
            self.reconcile_standard_matrix(&mut otu_set.characters, &otu_set.otus, matrix, doc)?;
        }
        for matrix in &orphaned {
            for character in matrix.characters() {
                Self::release_character(&mut otu_set.characters, character, matrix.id());
            }
            self.orphan(matrix)?;
        }
        if self.sweep_characters(&mut otu_set.characters)? || changed {
            otu_set.meta.mark_dirty();
        }

        let (changed, orphaned) =
            self.align_owned(&mut otu_set.dna_matrices, &source.dna_matrices, |doc: &DocMolecularMatrix| {
                DnaMatrix::new(doc.label.clone())
            })?;
        for matrix in &orphaned {
            self.orphan(matrix)?;
        }
        for (matrix, doc) in otu_set.dna_matrices.iter_mut().zip(&source.dna_matrices) {
            self.reconcile_molecular_matrix::<Nucleotide>(&otu_set.otus, matrix, doc)?;
        }
        if changed {
            otu_set.meta.mark_dirty();
        }

        let (changed, orphaned) = self.align_owned(
            &mut otu_set.protein_matrices,
            &source.protein_matrices,
            |doc: &DocMolecularMatrix| ProteinMatrix::new(doc.label.clone()),
        )?;
        for matrix in &orphaned {
            self.orphan(matrix)?;
        }
        for (matrix, doc) in otu_set
            .protein_matrices
            .iter_mut()
            .zip(&source.protein_matrices)
        {
            self.reconcile_molecular_matrix::<Residue>(&otu_set.otus, matrix, doc)?;
        }
        if changed {
            otu_set.meta.mark_dirty();
        }

        let (changed, orphaned) = self.align_owned(
            &mut otu_set.dna_sequence_sets,
            &source.dna_sequence_sets,
            |doc: &DocSequenceSet| DnaSequenceSet::new(doc.label.clone()),
        )?;
        for sequence_set in &orphaned {
            self.orphan(sequence_set)?;
        }
        for (sequence_set, doc) in otu_set
            .dna_sequence_sets
            .iter_mut()
            .zip(&source.dna_sequence_sets)
        {
            self.reconcile_sequence_set(&otu_set.otus, sequence_set, doc)?;
        }
        if changed {
            otu_set.meta.mark_dirty();
        }

        let (changed, orphaned) =
            self.align_owned(&mut otu_set.tree_sets, &source.tree_sets, |doc: &DocTreeSet| {
                TreeSet::new(doc.label.clone())
            })?;
        for tree_set in &orphaned {
            self.orphan(tree_set)?;
        }
        for (tree_set, doc) in otu_set.tree_sets.iter_mut().zip(&source.tree_sets) {
            self.reconcile_tree_set(&source.otus, &otu_set.otus, tree_set, doc)?;
        }
        if changed {
            otu_set.meta.mark_dirty();
        }

        if self.merge_attachments(&mut otu_set.attachments, &source.attachments)? {
            otu_set.meta.mark_dirty();
        }
        Ok(())
    }

    /// Stamps the new attachment vocabulary and the whole study, then closes
    /// the session.
    pub fn finish(mut self, study: &mut Study) -> Result<ReconcileReport, ReconcileError> {
        self.flush_rows()?;

        let version = self.version;
        for namespace in self.namespaces.values_mut() {
            if namespace.meta.stamp(version) {
                self.report.stamped += 1;
                self.report.new_namespaces.push(namespace.clone());
            }
        }
        for attachment_type in self.attachment_types.values_mut() {
            if attachment_type.meta.stamp(version) {
                self.report.stamped += 1;
                self.report.new_attachment_types.push(attachment_type.clone());
            }
        }

        self.report.stamped += stamp_study(study, version);

        info!(
            study = %study.id(),
            version = version.number(),
            created = self.report.total_created(),
            deleted = self.report.total_deleted(),
            stamped = self.report.stamped,
            "study reconciled"
        );
        Ok(self.report)
    }

    /// Fails under `UnknownIdPolicy::Reject` when the source names an id that
    /// matched nothing.
    fn admit_new(
        &self,
        kind: EntityKind,
        requested: Option<&ExternalId>,
    ) -> Result<(), ReconcileError> {
        match (self.config.unknown_ids, requested) {
            (UnknownIdPolicy::Reject, Some(id)) => Err(ReconcileError::NotFound {
                kind,
                external_id: id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn created<T: Entity>(&mut self, entity: &T, doc_id: Option<&str>) -> Result<(), ReconcileError> {
        self.dao.make_persistent(&entity.handle())?;
        self.report.count_created(T::KIND);
        if let Some(doc_id) = doc_id {
            self.report.assigned_ids.push(AssignedId {
                kind: T::KIND,
                doc_id: doc_id.to_string(),
                external_id: entity.id().clone(),
            });
        }
        Ok(())
    }

    fn orphan<T: Entity>(&mut self, entity: &T) -> Result<(), ReconcileError> {
        let handle = entity.handle();
        debug!(
            kind = handle.kind.as_str(),
            external_id = %handle.external_id,
            "deleting orphan"
        );
        self.dao.make_transient(&handle)?;
        self.report.count_deleted(handle.kind);
        Ok(())
    }

    /// Aligns `items` with `sources` by external id and creates the missing
    /// ones. Returns whether membership or order changed, plus the orphans.
    fn align_owned<T, S>(
        &mut self,
        items: &mut Vec<T>,
        sources: &[S],
        mut new: impl FnMut(&S) -> T,
    ) -> Result<(bool, Vec<T>), ReconcileError>
    where
        T: Entity,
        S: Incoming,
    {
        let previous = std::mem::take(items);
        let previous_len = previous.len();
        let alignment = align_by_id(previous, sources, |source| {
            self.admit_new(T::KIND, source.external_id())?;
            let item = new(source);
            self.created(&item, source.doc_id())?;
            Ok(item)
        })?;
        let changed = !alignment.is_unchanged(previous_len);
        *items = alignment.aligned;
        Ok((changed, alignment.orphaned))
    }

    /// Registers a finished row (or sequence) and flushes every
    /// `flush_every_rows` of them, evicting what was flushed.
    fn row_done(
        &mut self,
        handles: impl IntoIterator<Item = EntityHandle>,
    ) -> Result<(), ReconcileError> {
        self.pending_evictions.extend(handles);
        self.rows_since_flush += 1;
        if self.rows_since_flush >= self.config.flush_every_rows {
            self.flush_rows()?;
        }
        Ok(())
    }

    fn flush_rows(&mut self) -> Result<(), ReconcileError> {
        if self.rows_since_flush == 0 {
            return Ok(());
        }
        self.dao.flush()?;
        let evicted = std::mem::take(&mut self.pending_evictions);
        self.dao.evict(&evicted)?;
        debug!(
            rows = self.rows_since_flush,
            evicted = evicted.len(),
            "flushed rows"
        );
        self.rows_since_flush = 0;
        Ok(())
    }
}

/// Merges `incoming` onto `db_study` (or onto a new study when there is none)
/// under one freshly issued version.
pub fn create_or_update_study(
    db_study: Option<Study>,
    incoming: &DocStudy,
    config: &ReconcileConfig,
    versions: &mut dyn VersionSource,
    dao: &mut dyn Dao,
) -> Result<(Study, ReconcileReport), ReconcileError> {
    let version = versions.next_version()?;
    create_or_update_study_at(db_study, incoming, config, version, dao)
}

pub fn create_or_update_study_at(
    db_study: Option<Study>,
    incoming: &DocStudy,
    config: &ReconcileConfig,
    version: Version,
    dao: &mut dyn Dao,
) -> Result<(Study, ReconcileReport), ReconcileError> {
    let mut reconciler = Reconciler::new(config.clone(), version, dao);

    let mut study = match db_study {
        Some(study) => {
            if let Some(id) = incoming.external_id.as_ref() {
                if id != study.id() {
                    return Err(ReconcileError::malformed(format!(
                        "incoming study {id} does not match persisted study {}",
                        study.id()
                    )));
                }
            }
            study
        }
        None => {
            reconciler.admit_new(EntityKind::Study, incoming.external_id.as_ref())?;
            let study = Study::new(incoming.label.clone());
            reconciler.created(&study, incoming.doc_id.as_deref())?;
            study
        }
    };

    reconciler.reconcile_study(&mut study, incoming)?;
    let report = reconciler.finish(&mut study)?;
    Ok((study, report))
}
