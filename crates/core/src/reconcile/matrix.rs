#![forbid(unsafe_code)]

use super::Reconciler;
use crate::align::align_by_id;
use crate::dao::EntityKind;
use crate::doc::{DocCell, DocCharacter, DocMolecularMatrix, DocStandardMatrix};
use crate::error::ReconcileError;
use crate::ids::ExternalId;
use crate::model::{
    Cell, CellType, CellValue, Character, CharacterState, Element, Entity, Matrix, Molecular, Otu,
    Row, StandardMatrix, StateNumber,
};
use crate::symbols::parse_row;
use std::collections::{BTreeMap, BTreeSet};

impl Reconciler<'_> {
    /// Aligns the matrix's characters (drawing on the OTU set's character
    /// pool), remaps column versions to the new column order, then reconciles
    /// every row so that each reused cell follows its character.
    pub fn reconcile_standard_matrix(
        &mut self,
        pool: &mut BTreeMap<ExternalId, Character>,
        otus: &[Otu],
        matrix: &mut StandardMatrix,
        source: &DocStandardMatrix,
    ) -> Result<(), ReconcileError> {
        matrix.set_label(source.label.clone());
        matrix.set_description(source.description.clone());

        let column_count = source.characters.len();
        check_row_count(matrix.label(), source.rows.len(), otus.len())?;
        for row in source.rows.iter().flatten() {
            if row.cells.len() != column_count {
                return Err(ReconcileError::malformed(format!(
                    "row of matrix {:?} has {} cells for {column_count} characters",
                    source.label,
                    row.cells.len()
                )));
            }
        }

        let matrix_id = matrix.id().clone();
        let previous = std::mem::take(&mut matrix.characters);
        let old_column_count = previous.len();
        let previous_ids = previous.clone();

        let alignment = align_by_id(previous, &source.characters, |doc: &DocCharacter| {
            if let Some(id) = doc.external_id.as_ref() {
                if pool.contains_key(id) {
                    return Ok(id.clone());
                }
            }
            self.admit_new(EntityKind::Character, doc.external_id.as_ref())?;
            let character = Character::new(doc.label.clone());
            self.created(&character, doc.doc_id.as_deref())?;
            let id = character.id().clone();
            pool.insert(id.clone(), character);
            Ok(id)
        })?;

        for (id, doc) in alignment.aligned.iter().zip(&source.characters) {
            let Some(character) = pool.get_mut(id) else {
                return Err(ReconcileError::invariant(format!(
                    "character {id} missing from pool after alignment"
                )));
            };
            self.reconcile_character(character, doc, &matrix_id)?;
        }
        for id in &alignment.orphaned {
            Self::release_character(pool, id, &matrix_id);
        }

        let old_column_versions = std::mem::take(&mut matrix.column_versions);
        matrix.column_versions = alignment
            .previous_positions
            .iter()
            .map(|previous| previous.and_then(|old| old_column_versions.get(old).copied().flatten()))
            .collect();
        matrix.characters = alignment.aligned;
        if matrix.characters != previous_ids {
            matrix.meta.mark_dirty();
        }

        let mut resolved = Vec::with_capacity(source.rows.len());
        for row in &source.rows {
            let Some(row) = row else {
                resolved.push(None);
                continue;
            };
            let mut cells = Vec::with_capacity(column_count);
            for (id, doc_cell) in matrix.characters.iter().zip(&row.cells) {
                let Some(character) = pool.get(id) else {
                    return Err(ReconcileError::invariant(format!(
                        "character {id} missing from pool"
                    )));
                };
                cells.push(resolve_standard_cell(character, doc_cell)?);
            }
            resolved.push(Some(cells));
        }

        self.reconcile_rows(
            matrix,
            otus,
            &alignment.previous_positions,
            old_column_count,
            resolved,
        )?;

        if self.merge_attachments(&mut matrix.attachments, &source.attachments)? {
            matrix.meta.mark_dirty();
        }
        Ok(())
    }

    /// DNA and protein matrices align their columns by position.
    pub fn reconcile_molecular_matrix<E: Molecular>(
        &mut self,
        otus: &[Otu],
        matrix: &mut Matrix<E>,
        source: &DocMolecularMatrix,
    ) -> Result<(), ReconcileError> {
        matrix.set_label(source.label.clone());
        matrix.set_description(source.description.clone());
        check_row_count(matrix.label(), source.rows.len(), otus.len())?;

        let mut width = None;
        let mut resolved = Vec::with_capacity(source.rows.len());
        for row in &source.rows {
            let Some(text) = row else {
                resolved.push(None);
                continue;
            };
            let cells = parse_row::<E>(text)?;
            match width {
                None => width = Some(cells.len()),
                Some(width) if width != cells.len() => {
                    return Err(ReconcileError::malformed(format!(
                        "rows of matrix {:?} differ in length ({width} and {})",
                        source.label,
                        cells.len()
                    )));
                }
                Some(_) => {}
            }
            resolved.push(Some(cells));
        }

        let old_column_count = matrix.column_count();
        let column_count = width.unwrap_or(old_column_count);
        let previous_positions: Vec<Option<usize>> = (0..column_count)
            .map(|column| (column < old_column_count).then_some(column))
            .collect();
        matrix.column_versions.resize(column_count, None);
        if column_count != old_column_count {
            matrix.meta.mark_dirty();
        }

        self.reconcile_rows(
            matrix,
            otus,
            &previous_positions,
            old_column_count,
            resolved,
        )?;

        if self.merge_attachments(&mut matrix.attachments, &source.attachments)? {
            matrix.meta.mark_dirty();
        }
        Ok(())
    }

    /// Drops `matrix_id` from the character's users. The character stays in
    /// the pool until [`Reconciler::sweep_characters`] runs, so a later
    /// matrix of the same request can still pick it up.
    pub(crate) fn release_character(
        pool: &mut BTreeMap<ExternalId, Character>,
        character_id: &ExternalId,
        matrix_id: &ExternalId,
    ) {
        if let Some(character) = pool.get_mut(character_id) {
            character.matrices.remove(matrix_id);
        }
    }

    /// Deletes every pooled character no matrix uses any more. Returns
    /// whether anything was deleted.
    pub(crate) fn sweep_characters(
        &mut self,
        pool: &mut BTreeMap<ExternalId, Character>,
    ) -> Result<bool, ReconcileError> {
        let unused: Vec<ExternalId> = pool
            .iter()
            .filter(|(_, character)| character.matrices.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &unused {
            if let Some(character) = pool.remove(id) {
                self.orphan(&character)?;
            }
        }
        Ok(!unused.is_empty())
    }

    fn reconcile_character(
        &mut self,
        character: &mut Character,
        source: &DocCharacter,
        matrix_id: &ExternalId,
    ) -> Result<(), ReconcileError> {
        character.set_label(source.label.clone());
        character.set_mesquite_id(source.mesquite_id.clone());

        for state in &source.states {
            match character.states.get_mut(&state.state_number) {
                Some(existing) => {
                    existing.set_label(state.label.clone());
                }
                None => {
                    let created = CharacterState::new(state.state_number, state.label.clone());
                    self.created(&created, None)?;
                    character.states.insert(state.state_number, created);
                }
            }
        }
        character.matrices.insert(matrix_id.clone());

        if self.merge_attachments(&mut character.attachments, &source.attachments)? {
            character.meta.mark_dirty();
        }
        Ok(())
    }

    /// Rebuilds every row in OTU order. `previous_positions[i]` is the old
    /// column of new column `i`, or `None` for a column with no prior cells.
    fn reconcile_rows<E: Element>(
        &mut self,
        matrix: &mut Matrix<E>,
        otus: &[Otu],
        previous_positions: &[Option<usize>],
        old_column_count: usize,
        sources: Vec<Option<Vec<CellValue<E>>>>,
    ) -> Result<(), ReconcileError> {
        let otu_ids: Vec<ExternalId> = otus.iter().map(|otu| otu.id().clone()).collect();
        for stale in matrix.rows.sync_keys(&otu_ids) {
            self.orphan(&stale)?;
            matrix.meta.mark_dirty();
        }

        for (otu_id, source) in otu_ids.iter().zip(sources) {
            let Some(values) = source else {
                if let Some(row) = matrix.rows.take(otu_id) {
                    self.orphan(&row)?;
                    matrix.meta.mark_dirty();
                }
                continue;
            };

            let (mut row, is_new) = match matrix.rows.take(otu_id) {
                Some(row) => (row, false),
                None => {
                    let row = Row::new();
                    self.created(&row, None)?;
                    matrix.meta.mark_dirty();
                    (row, true)
                }
            };
            if !is_new && row.cells.len() != old_column_count {
                return Err(ReconcileError::invariant(format!(
                    "row for OTU {otu_id} has {} cells but the matrix had {old_column_count} columns",
                    row.cells.len()
                )));
            }

            let mut old_cells: Vec<Option<Cell<E>>> =
                std::mem::take(&mut row.cells).into_iter().map(Some).collect();
            let mut changed = false;
            let mut cells = Vec::with_capacity(values.len());
            for (column, (previous, value)) in previous_positions.iter().zip(&values).enumerate() {
                let reused = previous
                    .and_then(|old| old_cells.get_mut(old))
                    .and_then(Option::take);
                let (mut cell, fresh) = match reused {
                    Some(cell) => (cell, false),
                    None => {
                        self.report.count_created(EntityKind::Cell);
                        (Cell::new(), true)
                    }
                };
                if cell.set_value(value) || fresh {
                    changed = true;
                    if let Some(slot) = matrix.column_versions.get_mut(column) {
                        *slot = None;
                    }
                }
                cells.push(cell);
            }
            for stale in old_cells.into_iter().flatten() {
                self.orphan(&stale)?;
                changed = true;
            }
            row.cells = cells;
            if changed {
                row.meta.mark_dirty();
            }

            let needs_update = !is_new && row.meta.is_dirty();
            self.stamp_row(&mut row);
            if needs_update {
                self.dao.make_persistent(&row.handle())?;
            }

            let handles: Vec<_> = std::iter::once(row.handle())
                .chain(row.cells.iter().map(Entity::handle))
                .collect();
            matrix.rows.put(otu_id.clone(), Some(row));
            self.row_done(handles)?;
        }

        self.flush_rows()
    }

    /// Rows are versioned as soon as they are complete so they can be
    /// flushed and evicted before the rest of the matrix is done.
    fn stamp_row<E: Element>(&mut self, row: &mut Row<E>) {
        let mut cell_touched = false;
        for cell in &mut row.cells {
            if cell.meta.stamp(self.version) {
                self.report.stamped += 1;
            }
            cell_touched |= cell.meta.touched_in(self.version);
        }
        if cell_touched {
            row.meta.mark_dirty();
        }
        if row.meta.stamp(self.version) {
            self.report.stamped += 1;
        }
    }
}

fn check_row_count(label: &str, rows: usize, otus: usize) -> Result<(), ReconcileError> {
    if rows == otus {
        return Ok(());
    }
    Err(ReconcileError::malformed(format!(
        "matrix {label:?} has {rows} rows for {otus} OTUs"
    )))
}

/// Translates an incoming cell into state references of `character`.
fn resolve_standard_cell(
    character: &Character,
    cell: &DocCell,
) -> Result<CellValue<StateNumber>, ReconcileError> {
    let cell_type = CellType::parse(&cell.cell_type)?;
    let mut elements = BTreeSet::new();
    for state_number in &cell.state_numbers {
        if character.state(*state_number).is_none() {
            return Err(ReconcileError::invariant(format!(
                "state {state_number} is not defined by character {}",
                character.id()
            )));
        }
        elements.insert(StateNumber(*state_number));
    }
    Ok(CellValue::new(cell_type, elements, false)?)
}
