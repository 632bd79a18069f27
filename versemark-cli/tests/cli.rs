use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

fn versemark(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("versemark").unwrap();
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn search_prints_each_match_with_position() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("genesis.txt");
    fs::write(&doc, "In the beginning\nand the light, the light\n").unwrap();

    let output = versemark(dir.path())
        .arg(&doc)
        .args(["--search", "light"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "2:9:and the light, the light\n2:20:and the light, the light\n"
    );
}

#[test]
fn search_with_empty_term_fails() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("genesis.txt");
    fs::write(&doc, "text").unwrap();

    let output = versemark(dir.path())
        .arg(&doc)
        .args(["--search", ""])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("search term is empty"));
}

#[test]
fn list_bookmarks_reads_existing_snapshot() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("bookmarks.json");
    fs::write(
        &snapshot,
        r#"{
            "bookmarks": {
                "start": {"line": "2", "description": "intro"},
                "psalm": {"line": "23", "description": null}
            },
            "last_position": {"line": 2, "column": 0, "file": "/srv/kjv.txt"},
            "current_file": "/srv/kjv.txt"
        }"#,
    )
    .unwrap();

    let output = versemark(dir.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--list-bookmarks")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "start\t2\tintro\npsalm\t23\t\n"
    );
}

#[test]
fn list_bookmarks_reports_corrupt_snapshot() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("bookmarks.json");
    fs::write(&snapshot, "{\"bookmarks\": ").unwrap();

    let output = versemark(dir.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--list-bookmarks")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bookmark snapshot"));
    assert!(dir.path().join("bookmarks.json.corrupt").exists());
}

#[test]
fn list_bookmarks_with_missing_snapshot_prints_nothing() {
    let dir = tempdir().unwrap();

    let output = versemark(dir.path())
        .arg("--snapshot")
        .arg(dir.path().join("none.json"))
        .arg("--list-bookmarks")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
