//! End-to-end ingestion against the in-memory store

#![allow(clippy::unwrap_used)]

mod common;

use common::{color_file, Fixture, COLOR_SPEC, STAMP};
use dropload_common::ImportStatus;
use dropload_ingest::spec::ColumnValue;
use dropload_ingest::{FileOutcome, ImportStore, JournalPolicy};

fn finished(outcome: FileOutcome) -> dropload_ingest::FileReport {
    match outcome {
        FileOutcome::Finished(report) => report,
        other => panic!("expected a finished file, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_row_is_skipped_and_file_completes() {
    let fixture = Fixture::with_color_spec().await;
    fixture.write_data(&color_file(), &["Red    1", "Green 0", "Blue   0"]);

    let stats = fixture
        .engine(JournalPolicy::PerFile)
        .process_data_files(&fixture.data_dir)
        .await
        .unwrap();

    assert_eq!(stats.files_ready, 1);
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.rows_processed, 2);
    assert_eq!(stats.rows_failed, 1);

    let logs = fixture.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, ImportStatus::Complete);
    assert_eq!(logs[0].rows_processed, 2);

    let rows = fixture.store.rows("import_data_colors").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.import_log_id == logs[0].id));
    assert_eq!(
        rows[1].values,
        vec![ColumnValue::Text("Blue   ".to_string()), ColumnValue::Boolean(false)]
    );
}

#[tokio::test]
async fn test_completed_file_is_not_reprocessed() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data(&color_file(), &["Red    1", "Blue   0"]);
    let engine = fixture.engine(JournalPolicy::PerFile);

    finished(engine.process_file(&path).await.unwrap());
    assert_eq!(engine.process_file(&path).await.unwrap(), FileOutcome::AlreadyComplete);

    let stats = engine.process_data_files(&fixture.data_dir).await.unwrap();
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.rows_processed, 0);
    assert_eq!(fixture.color_rows(), 2);
    assert_eq!(fixture.store.logs().len(), 1);
}

#[tokio::test]
async fn test_same_identity_with_another_label_is_skipped() {
    let fixture = Fixture::with_color_spec().await;
    let first = fixture.write_data(&color_file(), &["Red    1"]);
    let relabelled = fixture.write_data(&format!("colors_{STAMP}_copy.txt"), &["Red    1"]);
    let engine = fixture.engine(JournalPolicy::PerFile);

    finished(engine.process_file(&first).await.unwrap());
    assert_eq!(
        engine.process_file(&relabelled).await.unwrap(),
        FileOutcome::AlreadyComplete
    );
    assert_eq!(fixture.color_rows(), 1);
}

#[tokio::test]
async fn test_resume_skips_rows_already_counted() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data(
        &color_file(),
        &["Red    1", "Orange 0", "Yellow 1", "Violet 0"],
    );

    // An interrupted run that got through two rows
    let format = fixture.store.find_format("colors").await.unwrap().unwrap();
    let (entry, _) = fixture
        .store
        .find_or_create_log(format.id, STAMP.parse().unwrap(), None)
        .await
        .unwrap();
    fixture.store.advance_log(entry.id, 2, None).await.unwrap();

    let report = finished(
        fixture
            .engine(JournalPolicy::PerFile)
            .process_file(&path)
            .await
            .unwrap(),
    );

    assert_eq!(report.rows_skipped, 2);
    assert_eq!(report.rows_persisted, 2);
    assert_eq!(report.rows_processed, 4);
    assert_eq!(report.status, ImportStatus::Complete);

    let rows = fixture.store.rows("import_data_colors").unwrap();
    assert_eq!(rows[0].values[0], ColumnValue::Text("Yellow ".to_string()));
}

#[tokio::test]
async fn test_non_conforming_names_create_no_entry() {
    let fixture = Fixture::with_color_spec().await;
    fixture.write_data("colors.txt", &["Red    1"]);
    fixture.write_data("colors_2024-01-01.txt", &["Red    1"]);
    fixture.write_data(&format!(".colors_{STAMP}.txt"), &["Red    1"]);

    let stats = fixture
        .engine(JournalPolicy::PerFile)
        .process_data_files(&fixture.data_dir)
        .await
        .unwrap();

    assert_eq!(stats.files_ready, 2);
    assert_eq!(stats.files_skipped, 2);
    assert!(fixture.store.logs().is_empty());
    assert_eq!(fixture.color_rows(), 0);
}

#[tokio::test]
async fn test_unknown_spec_and_bad_timestamp_fail_the_file() {
    let fixture = Fixture::with_color_spec().await;
    fixture.write_data(&format!("shapes_{STAMP}.txt"), &["Square 1"]);
    fixture.write_data("colors_2024-02-30T00:00:00.000Z.txt", &["Red    1"]);
    fixture.write_data(&color_file(), &["Red    1"]);

    let stats = fixture
        .engine(JournalPolicy::PerFile)
        .process_data_files(&fixture.data_dir)
        .await
        .unwrap();

    assert_eq!(stats.files_failed, 2);
    assert_eq!(stats.files_processed, 1);
    assert_eq!(fixture.store.logs().len(), 1);
}

#[tokio::test]
async fn test_file_without_valid_rows_is_failed_and_retried() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data(&color_file(), &["too short", "Red    x"]);
    let engine = fixture.engine(JournalPolicy::PerFile);

    let report = finished(engine.process_file(&path).await.unwrap());
    assert_eq!(report.status, ImportStatus::Failed);
    assert_eq!(report.rows_failed, 2);

    // Fixed file, same identity: the failed entry is resumed from zero
    fixture.write_data(&color_file(), &["Red    1"]);
    let report = finished(engine.process_file(&path).await.unwrap());
    assert_eq!(report.status, ImportStatus::Complete);
    assert_eq!(report.rows_processed, 1);
    assert_eq!(fixture.store.logs().len(), 1);
}

#[tokio::test]
async fn test_per_row_policy_counts_each_row() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data(&color_file(), &["Red    1", "Blue   0", "Green  1"]);
    fixture.store.fail_next_row_inserts(1);

    let engine = fixture.engine(JournalPolicy::PerRow);
    let report = finished(engine.process_file(&path).await.unwrap());

    assert_eq!(report.rows_failed, 1);
    assert_eq!(report.rows_persisted, 2);
    assert_eq!(report.rows_processed, 2);
    assert_eq!(report.status, ImportStatus::Complete);
    assert_eq!(fixture.color_rows(), 2);
}

#[tokio::test]
async fn test_entry_records_file_checksum() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data(&color_file(), &["Red    1"]);

    finished(
        fixture
            .engine(JournalPolicy::PerFile)
            .process_file(&path)
            .await
            .unwrap(),
    );

    let expected = dropload_common::checksum::file_sha256(&path).unwrap();
    assert_eq!(fixture.store.logs()[0].file_checksum.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_integer_columns_are_stored_typed() {
    let fixture = Fixture::new();
    fixture.write_spec(
        "counts",
        "column name,width,datatype\nname,5,TEXT\ncount,4,INTEGER\n",
    );
    fixture.registry().process_spec_files(&fixture.spec_dir).await.unwrap();
    fixture.write_data(&format!("counts_{STAMP}.txt"), &["apple  42", "pear  4.5", "plum 12.0"]);

    let stats = fixture
        .engine(JournalPolicy::PerFile)
        .process_data_files(&fixture.data_dir)
        .await
        .unwrap();
    assert_eq!(stats.rows_processed, 2);
    assert_eq!(stats.rows_failed, 1);

    let rows = fixture.store.rows("import_data_counts").unwrap();
    assert_eq!(rows[0].values[1], ColumnValue::Integer(42));
    assert_eq!(rows[1].values[1], ColumnValue::Integer(12));
}

#[tokio::test]
async fn test_header_only_spec_source_persists_nothing() {
    let fixture = Fixture::new();
    fixture.write_spec("colors", "column name,width,datatype\n");

    let stats = fixture.registry().process_spec_files(&fixture.spec_dir).await.unwrap();

    assert_eq!(stats.files_failed, 1);
    assert!(fixture.store.list_formats().await.unwrap().is_empty());
    assert!(!fixture.store.has_table("import_data_colors"));
}

#[tokio::test]
async fn test_repeated_spec_sweeps_are_idempotent() {
    let fixture = Fixture::new();
    fixture.write_spec("colors", COLOR_SPEC);
    let registry = fixture.registry();

    let first = registry.process_spec_files(&fixture.spec_dir).await.unwrap();
    let second = registry.process_spec_files(&fixture.spec_dir).await.unwrap();

    assert_eq!(first.files_processed, 1);
    assert_eq!(second.files_processed, 1);
    assert_eq!(fixture.store.list_formats().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_utf8_row_is_skipped_and_file_completes() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data_bytes(
        &color_file(),
        b"Red    1\nGr\xffen  0\nBlue   0\nGreen  1\n",
    );
    let engine = fixture.engine(JournalPolicy::PerFile);

    let report = finished(engine.process_file(&path).await.unwrap());
    assert_eq!(report.rows_failed, 1);
    assert_eq!(report.rows_persisted, 3);
    assert_eq!(report.status, ImportStatus::Complete);

    for _ in 0..2 {
        assert_eq!(engine.process_file(&path).await.unwrap(), FileOutcome::AlreadyComplete);
    }

    let logs = fixture.store.logs();
    assert_eq!(logs[0].status, ImportStatus::Complete);
    assert_eq!(logs[0].rows_processed, 3);
    assert_eq!(fixture.color_rows(), 3);
}

#[tokio::test]
async fn test_crlf_rows_are_accepted() {
    let fixture = Fixture::with_color_spec().await;
    let path = fixture.write_data_bytes(&color_file(), b"Red    1\r\nBlue   0\r\n");

    let report = finished(
        fixture
            .engine(JournalPolicy::PerFile)
            .process_file(&path)
            .await
            .unwrap(),
    );

    assert_eq!(report.rows_failed, 0);
    assert_eq!(report.rows_persisted, 2);
    let rows = fixture.store.rows("import_data_colors").unwrap();
    assert_eq!(rows[1].values[1], ColumnValue::Boolean(false));
}
