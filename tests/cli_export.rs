// Non-interactive `--export` path, runs without a terminal.

use std::rc::Rc;

use assert_cmd::Command;
use chrono::{Local, TimeZone};
use keyrun::{
    catalog::Locale,
    results::{ResultRecord, ResultStore},
    storage::{KeyValueStore, SqliteStore},
};
use predicates::prelude::*;

fn seed_store(dir: &std::path::Path) {
    let store: Rc<dyn KeyValueStore> = Rc::new(SqliteStore::open(&dir.join("store.db")).unwrap());
    let mut results = ResultStore::load(store);
    results.append(ResultRecord {
        date: Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        speed: 180,
        accuracy: 96,
        text_length: 120,
        category: "quotes".to_string(),
        language: Locale::En,
        duration: 40,
        mistakes: 3,
    });
}

#[test]
fn export_without_results_fails() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("keyrun")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--export")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no results to export"));
}

#[test]
fn export_writes_json_file() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("keyrun")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--export")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("typing-results-").and(predicate::str::contains(".json")));

    let file = std::fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
    assert_eq!(exported[0]["speed"], 180);
    assert_eq!(exported[0]["textLength"], 120);
    assert_eq!(exported[0]["language"], "en");
}

#[test]
fn export_csv_has_header_and_row() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("keyrun")
        .unwrap()
        .args(["--format", "csv", "--data-dir"])
        .arg(dir.path())
        .arg("--export")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::ends_with(".csv\n"));

    let file = std::fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    let csv = std::fs::read_to_string(file).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().contains("speed"));
    assert!(lines.next().unwrap().contains("180"));
}

#[test]
fn unknown_format_is_rejected() {
    Command::cargo_bin("keyrun")
        .unwrap()
        .args(["--format", "xml", "--export", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("xml"));
}
