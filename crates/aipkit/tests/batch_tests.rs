//! Whole-batch behavior: sheet handling, shared sinks, and parallel runs.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use aipkit::batch::sheet::{load_sheet, validate_sheet};
use aipkit::{ErrorCategory, SheetError};
use common::{row, FakeRunner, TestHarness};

#[test]
fn test_two_workers_keep_sinks_line_atomic() {
    let harness = TestHarness::new().workers(2);
    let ids = [
        "har-ms3000-001",
        "har-ms3000-002",
        "har-ms3000-003",
        "har-ms3000-004",
        "har-ms3000-005",
    ];
    for id in ids {
        harness.add_folder(id, &[("a.txt", id), ("b.txt", "shared")]);
    }
    harness.add_folder("har-ms3000-006", &[("objects/a.txt", "conflict")]);

    let mut rows: Vec<_> = ids.iter().map(|id| row("hargrett", id, id)).collect();
    rows.push(row("hargrett", "har-ms3000-006", "har-ms3000-006"));

    let summary = harness.run(Arc::new(FakeRunner::new()), &rows);

    assert_eq!(summary.completed, ids.map(String::from).to_vec());
    assert_eq!(
        summary.quarantined,
        vec![(
            "har-ms3000-006".to_string(),
            ErrorCategory::ObjectsFolderExists
        )]
    );

    let log_rows = harness.log_rows();
    assert_eq!(log_rows.len(), 6);
    let logged: HashSet<String> = log_rows.iter().map(|r| r[1].to_string()).collect();
    assert_eq!(logged.len(), 6);
    assert!(log_rows.iter().all(|r| r.len() == 13));

    let lines = harness.manifest_lines("hargrett");
    assert_eq!(lines.len(), 5);
    for line in &lines {
        let (digest, name) = line.split_once("  ").expect("digest and name");
        assert_eq!(digest.len(), 32);
        assert!(name.ends_with(".tar.bz2"));
    }
}

#[test]
fn test_rerun_appends_to_run_log_and_manifest() {
    let harness = TestHarness::new();
    harness.add_folder("har-ms3000-001", &[("a.txt", "same content")]);
    harness.run(
        Arc::new(FakeRunner::new()),
        &[row("hargrett", "har-ms3000-001", "har-ms3000-001")],
    );

    harness.add_folder("har-ms3000-002", &[("a.txt", "same content")]);
    harness.run(
        Arc::new(FakeRunner::new()),
        &[row("hargrett", "har-ms3000-002", "har-ms3000-002")],
    );

    let lines = harness.manifest_lines("hargrett");
    assert_eq!(lines.len(), 2);
    assert_ne!(lines[0], lines[1]);
    assert!(lines[0].contains("har-ms3000-001_bag."));
    assert!(lines[1].contains("har-ms3000-002_bag."));

    let raw = std::fs::read_to_string(harness.path("aip_log.csv")).unwrap();
    assert_eq!(raw.matches("Time Started").count(), 1);
    assert_eq!(harness.log_rows().len(), 2);
}

#[test]
fn test_departments_get_separate_manifests() {
    let harness = TestHarness::new();
    harness.add_folder("har-ms3000-001", &[("a.txt", "alpha")]);
    harness.add_folder("rbrl-001-er-000001", &[("b.txt", "beta")]);

    let summary = harness.run(
        Arc::new(FakeRunner::new()),
        &[
            row("hargrett", "har-ms3000-001", "har-ms3000-001"),
            row("russell", "rbrl-001-er-000001", "rbrl-001-er-000001"),
        ],
    );

    assert_eq!(summary.completed.len(), 2);
    assert_eq!(harness.manifest_lines("hargrett").len(), 1);
    assert_eq!(harness.manifest_lines("russell").len(), 1);
}

#[test]
fn test_quarantine_does_not_stop_batch() {
    let harness = TestHarness::new();
    harness.add_folder("har-ms3000-001", &[("metadata/old.xml", "<x/>"), ("a.txt", "a")]);
    harness.add_folder("har-ms3000-002", &[("a.txt", "alpha")]);

    let summary = harness.run(
        Arc::new(FakeRunner::new()),
        &[
            row("hargrett", "har-ms3000-001", "har-ms3000-001"),
            row("hargrett", "har-ms3000-002", "har-ms3000-002"),
        ],
    );

    assert_eq!(
        summary.quarantined,
        vec![(
            "har-ms3000-001".to_string(),
            ErrorCategory::MetadataFolderExists
        )]
    );
    assert_eq!(summary.completed, vec!["har-ms3000-002".to_string()]);
    assert_eq!(summary.total(), 2);

    let first = &harness.log_rows()[0];
    assert_eq!(
        &first[4],
        "Metadata folder already exists in original files"
    );
}

#[test]
fn test_sheet_is_loaded_and_checked_against_folders() {
    let harness = TestHarness::new();
    harness.add_folder("Box 1", &[("a.txt", "alpha")]);
    harness.add_folder("Box 2", &[("b.txt", "beta")]);
    harness.add_folder("stray", &[("c.txt", "gamma")]);
    std::fs::write(
        harness.path("metadata.csv"),
        "Department,Collection,Folder,AIP_ID,Title,Version,Zip\n\
         hargrett,ms3000,Box 1,har-ms3000-001,\"Letters, 1901\",1,\n\
         hargrett,ms3000,Box 2,har-ms3000-002,Diaries,2,no\n",
    )
    .unwrap();

    let rows = load_sheet(&harness.batch_dir).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].title, "Letters, 1901");
    assert_eq!(rows[0].zip, None);
    assert_eq!(rows[1].zip, Some(false));
    assert_eq!(rows[1].version, 2);

    let departments = vec!["hargrett".to_string()];
    match validate_sheet(&rows, &departments, &harness.batch_dir) {
        Err(SheetError::Invalid(problems)) => {
            assert_eq!(problems.len(), 1);
            assert!(problems[0].contains("stray"));
        }
        other => panic!("unexpected {:?}", other),
    }

    std::fs::remove_dir_all(harness.path("stray")).unwrap();
    validate_sheet(&rows, &departments, &harness.batch_dir).unwrap();
}
