use ppod_core::doc::{
    DocAttachment, DocCell, DocCharacter, DocOtu, DocOtuSet, DocStandardMatrix, DocStandardRow,
    DocState, DocStudy, export_study,
};
use ppod_core::model::Entity;
use ppod_core::{
    EntityKind, ExternalId, RecordingDao, ReconcileConfig, UnknownIdPolicy, create_or_update_study,
    now_ms,
};
use ppod_storage::{EntityOp, SqliteStore, StoreError};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "ppod_storage_{test_name}_{}_{}",
        std::process::id(),
        nanos
    ));
    dir
}

fn sample_study(label: &str) -> DocStudy {
    let otus: Vec<DocOtu> = ["otu-a", "otu-b"]
        .iter()
        .map(|name| DocOtu {
            doc_id: Some(name.to_string()),
            label: name.to_string(),
            ..DocOtu::default()
        })
        .collect();
    DocStudy {
        doc_id: Some(label.to_string()),
        label: label.to_string(),
        otu_sets: vec![DocOtuSet {
            label: "otus".to_string(),
            otus,
            standard_matrices: vec![DocStandardMatrix {
                label: "morphology".to_string(),
                characters: vec![DocCharacter {
                    label: "wings".to_string(),
                    states: vec![
                        DocState {
                            state_number: 0,
                            label: "absent".to_string(),
                        },
                        DocState {
                            state_number: 1,
                            label: "present".to_string(),
                        },
                    ],
                    ..DocCharacter::default()
                }],
                rows: vec![
                    Some(DocStandardRow {
                        cells: vec![DocCell::single(0)],
                    }),
                    Some(DocStandardRow {
                        cells: vec![DocCell::single(1)],
                    }),
                ],
                ..DocStandardMatrix::default()
            }],
            ..DocOtuSet::default()
        }],
        attachments: vec![DocAttachment::new("ppod", "note", label)],
        ..DocStudy::default()
    }
}

#[test]
fn open_installs_schema_and_reopens() {
    let dir = temp_dir("open_installs_schema_and_reopens");
    let store = SqliteStore::open(&dir).expect("open store");
    assert_eq!(store.storage_dir(), dir.as_path());
    assert!(dir.join("ppod.db").exists());
    drop(store);

    let store = SqliteStore::open(&dir).expect("reopen store");
    assert!(store.list_studies().expect("list").is_empty());
}

#[test]
fn foreign_database_is_refused() {
    let dir = temp_dir("foreign_database_is_refused");
    std::fs::create_dir_all(&dir).expect("create dir");
    let conn = Connection::open(dir.join("ppod.db")).expect("open raw db");
    conn.execute("CREATE TABLE unrelated(id TEXT PRIMARY KEY)", [])
        .expect("create table");
    drop(conn);

    let err = SqliteStore::open(&dir).expect_err("foreign schema must be refused");
    assert_eq!(err.code(), "RESET_REQUIRED");
}

#[test]
fn stored_study_loads_back_unchanged() {
    let dir = temp_dir("stored_study_loads_back_unchanged");
    let mut store = SqliteStore::open(&dir).expect("open store");

    let (study, report) = store
        .create_or_update_study(&sample_study("beetles"))
        .expect("store study");
    assert_eq!(report.version.number(), 1);

    let loaded = store.load_study(study.id()).expect("load study");
    assert_eq!(export_study(&loaded), export_study(&study));
    assert_eq!(loaded.version(), study.version());

    let summaries = store.list_studies().expect("list");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].external_id, *study.id());
    assert_eq!(summaries[0].label, "beetles");
    assert_eq!(summaries[0].version, 1);
}

#[test]
fn unchanged_resubmission_keeps_the_stored_version() {
    let dir = temp_dir("unchanged_resubmission_keeps_the_stored_version");
    let mut store = SqliteStore::open(&dir).expect("open store");
    let (study, _) = store
        .create_or_update_study(&sample_study("beetles"))
        .expect("store study");

    let (again, report) = store
        .create_or_update_study(&export_study(&study))
        .expect("resubmit");
    assert_eq!(report.version.number(), 2);
    assert_eq!(report.stamped, 0);
    assert_eq!(again.id(), study.id());
    assert_eq!(store.list_studies().expect("list")[0].version, 1);
    assert!(store.entity_log_since(1).expect("log").is_empty());

    let created = store.entity_log_since(0).expect("log");
    assert!(created.iter().all(|entry| entry.op == EntityOp::Persist));
    assert!(
        created
            .iter()
            .any(|entry| entry.kind == EntityKind::Study && entry.external_id == *study.id())
    );
}

#[test]
fn entity_log_records_deletes() {
    let dir = temp_dir("entity_log_records_deletes");
    let mut store = SqliteStore::open(&dir).expect("open store");
    let (study, _) = store
        .create_or_update_study(&sample_study("beetles"))
        .expect("store study");
    let removed = study.otu_sets()[0].otus()[1].id().clone();

    let mut doc = export_study(&study);
    doc.otu_sets[0].otus.pop();
    doc.otu_sets[0].standard_matrices[0].rows.pop();
    let (study, report) = store.update_study(&doc).expect("update");
    assert_eq!(study.otu_sets()[0].otus().len(), 1);

    let entries = store.entity_log_since(1).expect("log");
    assert!(entries.iter().all(|entry| entry.version == report.version.number()));
    assert!(entries.iter().any(|entry| {
        entry.op == EntityOp::Delete && entry.kind == EntityKind::Otu && entry.external_id == removed
    }));
    assert!(
        entries
            .iter()
            .any(|entry| entry.op == EntityOp::Delete && entry.kind == EntityKind::Row)
    );
}

#[test]
fn attachment_vocabulary_is_shared_across_sessions() {
    let dir = temp_dir("attachment_vocabulary_is_shared_across_sessions");
    let mut store = SqliteStore::open(&dir).expect("open store");

    let (first, report) = store
        .create_or_update_study(&sample_study("beetles"))
        .expect("first study");
    assert_eq!(report.new_namespaces.len(), 1);
    assert_eq!(report.new_attachment_types.len(), 1);

    let (second, report) = store
        .create_or_update_study(&sample_study("wasps"))
        .expect("second study");
    assert!(report.new_namespaces.is_empty());
    assert!(report.new_attachment_types.is_empty());
    assert_eq!(report.created(EntityKind::AttachmentType), 0);
    assert_eq!(
        second.attachments()[0].attachment_type().external_id,
        first.attachments()[0].attachment_type().external_id
    );
    assert_ne!(first.id(), second.id());
    assert_eq!(store.list_studies().expect("list").len(), 2);
}

#[test]
fn failed_merge_leaves_the_store_untouched() {
    let dir = temp_dir("failed_merge_leaves_the_store_untouched");
    let mut store = SqliteStore::open(&dir).expect("open store");

    let mut doc = sample_study("beetles");
    doc.otu_sets[0].standard_matrices[0].rows.pop();
    let err = store.create_or_update_study(&doc).expect_err("row count mismatch");
    assert_eq!(err.code(), "MALFORMED");

    assert!(store.list_studies().expect("list").is_empty());
    assert!(store.entity_log_since(0).expect("log").is_empty());
    assert_eq!(store.next_version().expect("version").number(), 1);
}

#[test]
fn strict_update_and_lookup_need_known_ids() {
    let dir = temp_dir("strict_update_and_lookup_need_known_ids");
    let mut store = SqliteStore::open(&dir).expect("open store");

    let err = store
        .update_study(&sample_study("beetles"))
        .expect_err("update without id");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let mut doc = sample_study("beetles");
    doc.external_id = Some(ExternalId::try_new("missing-study").expect("id"));
    let err = store.update_study(&doc).expect_err("unknown study");
    assert_eq!(err.code(), "NOT_FOUND");

    let err = store
        .load_study(&ExternalId::try_new("missing-study").expect("id"))
        .expect_err("unknown study");
    assert!(matches!(err, StoreError::UnknownId));
}

#[test]
fn reject_policy_applies_to_stored_sessions() {
    let dir = temp_dir("reject_policy_applies_to_stored_sessions");
    let mut store = SqliteStore::open(&dir)
        .expect("open store")
        .with_config(ReconcileConfig::default().with_unknown_ids(UnknownIdPolicy::Reject));

    let mut doc = sample_study("beetles");
    doc.external_id = Some(ExternalId::try_new("missing-study").expect("id"));
    let err = store.create_or_update_study(&doc).expect_err("reject");
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(store.config().unknown_ids, UnknownIdPolicy::Reject);
}

#[test]
fn store_hands_out_versions_to_other_sessions() {
    let dir = temp_dir("store_hands_out_versions_to_other_sessions");
    let mut store = SqliteStore::open(&dir).expect("open store");
    assert_eq!(store.next_version().expect("version").number(), 1);

    let mut dao = RecordingDao::new();
    let (_, report) = create_or_update_study(
        None,
        &sample_study("beetles"),
        &ReconcileConfig::default(),
        &mut store,
        &mut dao,
    )
    .expect("merge");
    assert_eq!(report.version.number(), 2);
}

#[test]
fn versions_carry_the_issue_time() {
    let dir = temp_dir("versions_carry_the_issue_time");
    let mut store = SqliteStore::open(&dir).expect("open store");
    let before = now_ms();
    let version = store.next_version().expect("version");
    let after = now_ms();
    assert!(before <= version.created_at_ms() && version.created_at_ms() <= after);
}

#[test]
fn logged_names_parse_back() {
    let dir = temp_dir("logged_names_parse_back");
    let mut store = SqliteStore::open(&dir).expect("open store");
    store
        .create_or_update_study(&sample_study("beetles"))
        .expect("store study");

    let entries = store.entity_log_since(0).expect("log");
    assert!(!entries.is_empty());
    for entry in &entries {
        assert_eq!(EntityOp::parse(entry.op.as_str()), Some(entry.op));
        assert_eq!(EntityKind::parse(entry.kind.as_str()), Some(entry.kind));
    }
    assert_eq!(EntityOp::parse("update"), None);
    assert_eq!(EntityKind::parse("matrix"), None);
}
