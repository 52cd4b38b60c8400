use ppod_core::doc::{
    DocCell, DocCharacter, DocMolecularMatrix, DocOtu, DocOtuSet, DocStandardMatrix,
    DocStandardRow, DocState, DocStudy, export_study,
};
use ppod_core::model::{CellType, Entity, Nucleotide, StateNumber, Study};
use ppod_core::{
    EntityKind, RecordingDao, ReconcileConfig, ReconcileError, ReconcileReport, UnknownIdPolicy,
    VersionClock, create_or_update_study,
};

fn doc_otu(name: &str) -> DocOtu {
    DocOtu {
        doc_id: Some(name.to_string()),
        label: name.to_string(),
        ..DocOtu::default()
    }
}

fn doc_character(label: &str) -> DocCharacter {
    DocCharacter {
        label: label.to_string(),
        states: (0..3)
            .map(|state_number| DocState {
                state_number,
                label: format!("{label}-{state_number}"),
            })
            .collect(),
        ..DocCharacter::default()
    }
}

fn single_row(states: &[u32]) -> Option<DocStandardRow> {
    Some(DocStandardRow {
        cells: states.iter().map(|state| DocCell::single(*state)).collect(),
    })
}

fn standard_study(
    otus: &[&str],
    characters: &[&str],
    rows: Vec<Option<DocStandardRow>>,
) -> DocStudy {
    DocStudy {
        label: "study".to_string(),
        otu_sets: vec![DocOtuSet {
            label: "otus".to_string(),
            otus: otus.iter().map(|name| doc_otu(name)).collect(),
            standard_matrices: vec![DocStandardMatrix {
                label: "morphology".to_string(),
                characters: characters.iter().map(|label| doc_character(label)).collect(),
                rows,
                ..DocStandardMatrix::default()
            }],
            ..DocOtuSet::default()
        }],
        ..DocStudy::default()
    }
}

fn merge(
    db: Option<Study>,
    doc: &DocStudy,
    clock: &mut VersionClock,
    dao: &mut RecordingDao,
) -> Result<(Study, ReconcileReport), ReconcileError> {
    create_or_update_study(db, doc, &ReconcileConfig::default(), clock, dao)
}

fn cell_states(study: &Study, otu_index: usize) -> Vec<Vec<u32>> {
    let otu_set = &study.otu_sets()[0];
    let otu = &otu_set.otus()[otu_index];
    let row = otu_set.standard_matrices()[0]
        .row(otu.id())
        .expect("row present");
    row.cells()
        .iter()
        .map(|cell| cell.elements().iter().map(|state| state.0).collect())
        .collect()
}

#[test]
fn merging_an_exported_study_changes_nothing() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a", "b"],
        &["c0", "c1"],
        vec![single_row(&[0, 1]), single_row(&[2, 0])],
    );
    let (study, first) = merge(None, &doc, &mut clock, &mut dao).expect("first merge");
    let v1 = first.version;
    assert_eq!(study.version(), Some(v1));
    assert_eq!(first.created(EntityKind::Row), 2);
    assert_eq!(first.created(EntityKind::Cell), 4);

    dao.clear();
    let doc = export_study(&study);
    let (study, second) = merge(Some(study), &doc, &mut clock, &mut dao).expect("second merge");

    assert_eq!(second.stamped, 0);
    assert_eq!(second.total_created(), 0);
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(study.version(), Some(v1));
    assert!(dao.persisted(EntityKind::Row).is_empty());
    assert!(dao.deleted(EntityKind::Cell).is_empty());
    let matrix = &study.otu_sets()[0].standard_matrices()[0];
    assert_eq!(matrix.version(), Some(v1));
    assert!(matrix.column_versions().iter().all(|slot| *slot == Some(v1)));
}

#[test]
fn reordered_characters_carry_their_cells() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a"], &["c0", "c1", "c2"], vec![single_row(&[0, 1, 2])]);
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    // Change only the first column so column versions become distinguishable.
    let mut doc = export_study(&study);
    doc.otu_sets[0].standard_matrices[0].rows[0] = single_row(&[1, 1, 2]);
    let (study, second) = merge(Some(study), &doc, &mut clock, &mut dao).expect("edit");
    let v1 = 1;
    let v2 = second.version;

    let matrix = &study.otu_sets()[0].standard_matrices()[0];
    let column_numbers: Vec<i64> = matrix
        .column_versions()
        .iter()
        .map(|slot| slot.expect("column version").number())
        .collect();
    assert_eq!(column_numbers, vec![v2.number(), v1, v1]);

    let otu_id = study.otu_sets()[0].otus()[0].id().clone();
    let old_characters = matrix.characters().to_vec();
    let old_row = matrix.row(&otu_id).expect("row").clone();
    let old_cell_ids: Vec<_> = old_row.cells().iter().map(|cell| cell.id().clone()).collect();
    let old_column_versions = matrix.column_versions().to_vec();
    assert_eq!(old_row.version(), Some(v2));

    let mut doc = export_study(&study);
    let doc_matrix = &mut doc.otu_sets[0].standard_matrices[0];
    doc_matrix.characters.reverse();
    doc_matrix.rows[0] = single_row(&[2, 1, 1]);
    let (study, third) = merge(Some(study), &doc, &mut clock, &mut dao).expect("reorder");

    let matrix = &study.otu_sets()[0].standard_matrices()[0];
    let mut expected_characters = old_characters.clone();
    expected_characters.reverse();
    assert_eq!(matrix.characters(), expected_characters.as_slice());

    let row = matrix.row(&otu_id).expect("row");
    assert_eq!(row.version(), Some(v2));
    let cell_ids: Vec<_> = row.cells().iter().map(|cell| cell.id().clone()).collect();
    let mut expected_ids = old_cell_ids.clone();
    expected_ids.reverse();
    assert_eq!(cell_ids, expected_ids);
    assert_eq!(cell_states(&study, 0), vec![vec![2], vec![1], vec![1]]);

    let mut expected_versions = old_column_versions.clone();
    expected_versions.reverse();
    assert_eq!(matrix.column_versions(), expected_versions.as_slice());
    assert_eq!(matrix.version(), Some(third.version));
    assert_eq!(third.total_created(), 0);
}

#[test]
fn inserted_and_removed_columns() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a"], &["c0", "c1", "c2"], vec![single_row(&[0, 1, 2])]);
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    let mut doc = export_study(&study);
    let doc_matrix = &mut doc.otu_sets[0].standard_matrices[0];
    doc_matrix.characters.remove(1);
    doc_matrix.characters.insert(0, doc_character("new"));
    doc_matrix.rows[0] = single_row(&[2, 0, 2]);
    let (study, report) = merge(Some(study), &doc, &mut clock, &mut dao).expect("edit");

    let matrix = &study.otu_sets()[0].standard_matrices()[0];
    assert_eq!(matrix.column_count(), 3);
    assert_eq!(cell_states(&study, 0), vec![vec![2], vec![0], vec![2]]);
    assert_eq!(report.created(EntityKind::Character), 1);
    assert_eq!(report.deleted(EntityKind::Character), 1);
    assert_eq!(report.deleted(EntityKind::Cell), 1);
    assert_eq!(report.created(EntityKind::Cell), 1);
    assert_eq!(matrix.column_versions()[0], Some(report.version));
    assert_eq!(study.otu_sets()[0].characters().count(), 3);
}

#[test]
fn removed_otus_lose_their_rows() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a", "b", "c"],
        &["c0"],
        vec![single_row(&[0]), single_row(&[1]), single_row(&[2])],
    );
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");
    let b_id = study.otu_sets()[0].otus()[1].id().clone();

    let mut doc = export_study(&study);
    doc.otu_sets[0].otus.remove(1);
    doc.otu_sets[0].standard_matrices[0].rows.remove(1);
    dao.clear();
    let (study, report) = merge(Some(study), &doc, &mut clock, &mut dao).expect("remove b");

    let otu_set = &study.otu_sets()[0];
    let labels: Vec<&str> = otu_set.otus().iter().map(|otu| otu.label()).collect();
    assert_eq!(labels, vec!["a", "c"]);
    let deleted: Vec<_> = dao
        .deleted(EntityKind::Otu)
        .into_iter()
        .map(|handle| handle.external_id.clone())
        .collect();
    assert_eq!(deleted, vec![b_id.clone()]);
    assert_eq!(report.deleted(EntityKind::Row), 1);

    let matrix = &otu_set.standard_matrices()[0];
    assert!(!matrix.rows().contains_key(&b_id));
    assert_eq!(matrix.rows().len(), 2);

    assert_eq!(report.removed_otus.len(), 1);
    let removed = &report.removed_otus[0];
    assert_eq!(removed.id(), &b_id);
    assert_eq!(removed.parent(), None);
    assert!(otu_set.otus().iter().all(|otu| otu.parent() == Some(otu_set.id())));
    assert_eq!(otu_set.version(), Some(report.version));
}

#[test]
fn missing_row_empties_the_slot() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a", "b"],
        &["c0"],
        vec![single_row(&[0]), single_row(&[1])],
    );
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    let mut doc = export_study(&study);
    doc.otu_sets[0].standard_matrices[0].rows[1] = None;
    let (study, report) = merge(Some(study), &doc, &mut clock, &mut dao).expect("drop row");

    let otu_set = &study.otu_sets()[0];
    let b_id = otu_set.otus()[1].id();
    let matrix = &otu_set.standard_matrices()[0];
    assert!(matrix.rows().contains_key(b_id));
    assert!(matrix.row(b_id).is_none());
    assert_eq!(report.deleted(EntityKind::Row), 1);
}

#[test]
fn single_cell_without_state_fails() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a"],
        &["c0"],
        vec![Some(DocStandardRow {
            cells: vec![DocCell::new(CellType::Single, &[])],
        })],
    );
    let err = merge(None, &doc, &mut clock, &mut dao).unwrap_err();
    assert!(matches!(err, ReconcileError::Malformed(_)));
}

#[test]
fn polymorphic_cells_keep_every_state() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a"],
        &["c0", "c1"],
        vec![Some(DocStandardRow {
            cells: vec![
                DocCell::new(CellType::Polymorphic, &[0, 2]),
                DocCell::new(CellType::Inapplicable, &[]),
            ],
        })],
    );
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");
    let otu_set = &study.otu_sets()[0];
    let row = otu_set.standard_matrices()[0]
        .row(otu_set.otus()[0].id())
        .expect("row");
    assert_eq!(row.cells()[0].cell_type(), CellType::Polymorphic);
    assert_eq!(
        row.cells()[0].elements().iter().copied().collect::<Vec<_>>(),
        vec![StateNumber(0), StateNumber(2)]
    );
    assert_eq!(row.cells()[1].cell_type(), CellType::Inapplicable);
}

#[test]
fn unknown_cell_type_and_missing_state_are_invariant_violations() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();

    let doc = standard_study(
        &["a"],
        &["c0"],
        vec![Some(DocStandardRow {
            cells: vec![DocCell {
                cell_type: "MAYBE".to_string(),
                state_numbers: vec![0],
            }],
        })],
    );
    let err = merge(None, &doc, &mut clock, &mut dao).unwrap_err();
    assert!(err.is_fatal());

    let doc = standard_study(&["a"], &["c0"], vec![single_row(&[7])]);
    let err = merge(None, &doc, &mut clock, &mut dao).unwrap_err();
    assert!(matches!(err, ReconcileError::Invariant(_)));
}

#[test]
fn row_count_must_match_otus() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a", "b"], &["c0"], vec![single_row(&[0])]);
    let err = merge(None, &doc, &mut clock, &mut dao).unwrap_err();
    assert_eq!(err.kind_str(), "malformed");

    let doc = standard_study(&["a"], &["c0", "c1"], vec![single_row(&[0])]);
    let err = merge(None, &doc, &mut clock, &mut dao).unwrap_err();
    assert_eq!(err.kind_str(), "malformed");
}

#[test]
fn characters_are_shared_until_the_last_matrix_drops_them() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a"], &["shared"], vec![single_row(&[1])]);
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    let mut doc = export_study(&study);
    let first = doc.otu_sets[0].standard_matrices[0].clone();
    doc.otu_sets[0].standard_matrices.push(DocStandardMatrix {
        label: "second".to_string(),
        characters: first.characters.clone(),
        rows: vec![single_row(&[2])],
        ..DocStandardMatrix::default()
    });
    let (study, report) = merge(Some(study), &doc, &mut clock, &mut dao).expect("share");
    assert_eq!(report.created(EntityKind::Character), 0);

    let otu_set = &study.otu_sets()[0];
    assert_eq!(otu_set.characters().count(), 1);
    let character = otu_set.characters().next().expect("character");
    assert_eq!(character.matrices().len(), 2);
    let shared_id = character.id().clone();
    assert_eq!(otu_set.standard_matrices()[1].characters(), &[shared_id.clone()]);

    let mut doc = export_study(&study);
    doc.otu_sets[0].standard_matrices.remove(0);
    dao.clear();
    let (study, _) = merge(Some(study), &doc, &mut clock, &mut dao).expect("drop first");
    let otu_set = &study.otu_sets()[0];
    assert!(dao.deleted(EntityKind::Character).is_empty());
    assert_eq!(dao.deleted(EntityKind::StandardMatrix).len(), 1);
    let character = otu_set.character(&shared_id).expect("still pooled");
    assert_eq!(character.matrices().len(), 1);

    let mut doc = export_study(&study);
    doc.otu_sets[0].standard_matrices.clear();
    dao.clear();
    let (study, _) = merge(Some(study), &doc, &mut clock, &mut dao).expect("drop second");
    assert_eq!(dao.deleted(EntityKind::Character).len(), 1);
    assert_eq!(study.otu_sets()[0].characters().count(), 0);
}

#[test]
fn character_moved_between_matrices_keeps_its_identity() {
    for policy in [UnknownIdPolicy::Create, UnknownIdPolicy::Reject] {
        let config = ReconcileConfig::default().with_unknown_ids(policy);
        let mut clock = VersionClock::new();
        let mut dao = RecordingDao::new();
        let mut doc = standard_study(&["a"], &["x", "y"], vec![single_row(&[0, 1])]);
        doc.otu_sets[0].standard_matrices.push(DocStandardMatrix {
            label: "second".to_string(),
            characters: vec![doc_character("z")],
            rows: vec![single_row(&[2])],
            ..DocStandardMatrix::default()
        });
        let (study, _) =
            create_or_update_study(None, &doc, &config, &mut clock, &mut dao).expect("create");
        let x_id = study.otu_sets()[0].standard_matrices()[0].characters()[0].clone();
        let y_id = study.otu_sets()[0].standard_matrices()[0].characters()[1].clone();

        let mut doc = export_study(&study);
        let matrices = &mut doc.otu_sets[0].standard_matrices;
        let x = matrices[0].characters.remove(0);
        let x_cell = matrices[0].rows[0].as_mut().expect("row").cells.remove(0);
        matrices[1].characters.push(x);
        matrices[1].rows[0].as_mut().expect("row").cells.push(x_cell);
        dao.clear();
        let (study, report) = create_or_update_study(Some(study), &doc, &config, &mut clock, &mut dao)
            .unwrap_or_else(|err| panic!("move under {policy:?}: {err}"));

        assert_eq!(report.created(EntityKind::Character), 0);
        assert_eq!(report.deleted(EntityKind::Character), 0);
        assert!(dao.deleted(EntityKind::Character).is_empty());

        let otu_set = &study.otu_sets()[0];
        assert_eq!(otu_set.characters().count(), 3);
        let first = &otu_set.standard_matrices()[0];
        let second = &otu_set.standard_matrices()[1];
        assert_eq!(first.characters(), &[y_id.clone()]);
        assert_eq!(second.characters()[1], x_id);

        let character = otu_set.character(&x_id).expect("x still pooled");
        assert_eq!(character.label(), "x");
        assert_eq!(character.matrices().len(), 1);
        assert!(character.matrices().contains(second.id()));

        let otu = &otu_set.otus()[0];
        let cells = second.row(otu.id()).expect("row").cells();
        let moved: Vec<u32> = cells[1].elements().iter().map(|state| state.0).collect();
        assert_eq!(moved, vec![0]);
        assert_eq!(cell_states(&study, 0), vec![vec![1]]);
    }
}

#[test]
fn one_cell_edit_stamps_the_path_to_the_study() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a"], &["c0"], vec![single_row(&[0])]);
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    let mut doc = export_study(&study);
    doc.otu_sets[0].standard_matrices[0].rows[0] = single_row(&[1]);
    let (study, report) = merge(Some(study), &doc, &mut clock, &mut dao).expect("edit");

    // cell, row, matrix, OTU set and study
    assert_eq!(report.stamped, 5);
    assert_eq!(study.version(), Some(report.version));
    assert_eq!(cell_states(&study, 0), vec![vec![1]]);
}

#[test]
fn states_missing_from_the_source_are_retained() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(&["a"], &["c0"], vec![single_row(&[0])]);
    let (study, _) = merge(None, &doc, &mut clock, &mut dao).expect("create");

    let mut doc = export_study(&study);
    let character = &mut doc.otu_sets[0].standard_matrices[0].characters[0];
    character.states.truncate(1);
    character.states[0].label = "renamed".to_string();
    let (study, _) = merge(Some(study), &doc, &mut clock, &mut dao).expect("edit states");

    let character = study.otu_sets()[0].characters().next().expect("character");
    assert_eq!(character.states().count(), 3);
    assert_eq!(character.state(0).expect("state 0").label(), "renamed");
}

fn dna_study(rows: &[Option<&str>]) -> DocStudy {
    DocStudy {
        label: "dna".to_string(),
        otu_sets: vec![DocOtuSet {
            label: "otus".to_string(),
            otus: (0..rows.len())
                .map(|index| doc_otu(&format!("otu-{index}")))
                .collect(),
            dna_matrices: vec![DocMolecularMatrix {
                label: "coi".to_string(),
                rows: rows.iter().map(|row| row.map(str::to_string)).collect(),
                ..DocMolecularMatrix::default()
            }],
            ..DocOtuSet::default()
        }],
        ..DocStudy::default()
    }
}

#[test]
fn dna_columns_align_by_position() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let (study, first) =
        merge(None, &dna_study(&[Some("ACGT"), Some("AC-?")]), &mut clock, &mut dao)
            .expect("create");
    let v1 = first.version;

    let otu_set = &study.otu_sets()[0];
    let matrix = &otu_set.dna_matrices()[0];
    assert_eq!(matrix.column_count(), 4);
    let row = matrix.row(otu_set.otus()[1].id()).expect("row");
    assert_eq!(row.cells()[2].cell_type(), CellType::Inapplicable);
    assert_eq!(row.cells()[3].cell_type(), CellType::Unassigned);
    let first_row_ids: Vec<_> = matrix
        .row(otu_set.otus()[0].id())
        .expect("row")
        .cells()
        .iter()
        .map(|cell| cell.id().clone())
        .collect();

    let mut doc = export_study(&study);
    doc.otu_sets[0].dna_matrices[0].rows = vec![Some("ACGTA".to_string()), Some("ACGTT".to_string())];
    let (study, second) = merge(Some(study), &doc, &mut clock, &mut dao).expect("grow");
    let v2 = second.version;

    let otu_set = &study.otu_sets()[0];
    let matrix = &otu_set.dna_matrices()[0];
    assert_eq!(
        matrix.column_versions(),
        &[Some(v1), Some(v1), Some(v2), Some(v2), Some(v2)]
    );
    let row = matrix.row(otu_set.otus()[0].id()).expect("row");
    let reused: Vec<_> = row.cells()[..4].iter().map(|cell| cell.id().clone()).collect();
    assert_eq!(reused, first_row_ids);
    assert_eq!(
        row.cells()[4].elements().iter().copied().collect::<Vec<_>>(),
        vec![Nucleotide::A]
    );
}

#[test]
fn dna_rows_must_share_a_length() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let err = merge(None, &dna_study(&[Some("ACGT"), Some("AC")]), &mut clock, &mut dao)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Malformed(_)));
}

#[test]
fn rows_are_flushed_in_batches() {
    let mut clock = VersionClock::new();
    let mut dao = RecordingDao::new();
    let doc = standard_study(
        &["a", "b", "c", "d"],
        &["c0", "c1"],
        vec![
            single_row(&[0, 0]),
            single_row(&[1, 1]),
            single_row(&[2, 2]),
            single_row(&[0, 1]),
        ],
    );
    let config = ReconcileConfig::default().with_flush_every_rows(2);
    create_or_update_study(None, &doc, &config, &mut clock, &mut dao).expect("create");

    assert_eq!(dao.flushes(), 2);
    assert_eq!(dao.evicted(), 4 + 4 * 2);
}
