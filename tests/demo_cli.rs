//! End-to-end tests for the demo binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn demo() -> Command {
    Command::cargo_bin("logwrap-demo").unwrap()
}

#[test]
fn test_prints_version_and_paths() {
    demo()
        .args(["--count", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "version: {}",
            env!("CARGO_PKG_VERSION")
        )))
        .stdout(predicate::str::contains("[\"<stderr>\"]"));
}

#[test]
fn test_writes_records_to_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("demo.log");

    demo()
        .args(["--no-console", "--no-date-filename", "--count", "4", "--instance", "cli"])
        .arg("--file")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(path.display().to_string()));

    let content = std::fs::read_to_string(&path).unwrap();
    for n in 0..4 {
        assert!(content.contains(&format!("test of {}", n)), "{}", content);
    }
    assert!(content.contains(":cli:main:main:"));
    assert!(content.contains(":tracing:"));
}

#[test]
fn test_dated_file_name() {
    let temp = TempDir::new().unwrap();

    demo()
        .args(["--no-console", "--count", "1"])
        .arg("--file")
        .arg(temp.path().join("logs").join("demo.log"))
        .assert()
        .success();

    let names: Vec<String> = std::fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    let name = &names[0];
    assert!(name.starts_with("demo_") && name.ends_with(".log"), "{}", name);
    assert_eq!(name.len(), "demo_20230501120000.log".len());
}

#[test]
fn test_rejects_unknown_level() {
    demo()
        .args(["--level", "loud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid level"));
}
