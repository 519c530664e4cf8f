// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, missing_docs)]

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("store")).unwrap();
        Self { root }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("shape-index").unwrap();
        cmd.arg("--store-dir")
            .arg(self.root.path().join("store"))
            .arg("--config-dir")
            .arg(self.root.path().join("config"));
        cmd
    }

    fn record(&self, name: &str, body: &str) -> std::path::PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn uid_of(&self, file: &Path) -> String {
        let out = self.cmd().arg("index").arg(file).output().unwrap();
        assert!(out.status.success());
        let line = String::from_utf8(out.stdout).unwrap();
        line.trim().rsplit('\t').next().unwrap().to_owned()
    }
}

const VISIT_PERSON_ADDRESS: &str = r#"{"archetype": "Visit", "ehr_data": {
    "p": {"archetype": "Person", "ehr_data": {
        "home": {"archetype": "Address", "ehr_data": {"city": "Pisa"}}
    }}
}}"#;

const VISIT_PERSON: &str =
    r#"{"archetype": "Visit", "ehr_data": {"p": {"archetype": "Person", "ehr_data": {"name": "Ada"}}}}"#;

#[test]
fn init_creates_scope_once() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created scope path_index"));
    ws.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn index_is_idempotent_and_query_finds_structure() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    let nested = ws.record("nested.json", VISIT_PERSON_ADDRESS);
    let flat = ws.record("flat.json", VISIT_PERSON);

    let uid = ws.uid_of(&nested);
    assert_eq!(ws.uid_of(&nested), uid);
    assert_ne!(ws.uid_of(&flat), uid);

    ws.cmd()
        .args(["query", "--contains", "Visit", "--contains", "Person", "--contains", "*"])
        .assert()
        .success()
        .stdout(format!("{uid}\n"));

    ws.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{uid}\t")).and(predicate::str::contains("\t2\tVisit")));
}

#[test]
fn explain_renders_path_without_store() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("shape-index")
        .unwrap()
        .arg("--config-dir")
        .arg(dir.path())
        .args(["explain", "--contains", "Visit", "--contains", "Person"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "collection(\"path_index\")/archetype[@class=\"Visit\"]//archetype[@class=\"Person\"]/ancestor-or-self::archetype/structure_id",
        ));
}

#[test]
fn saved_settings_supply_the_store_dir() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["--scope", "wards", "init", "--save-config"])
        .assert()
        .success();
    let record = ws.record("r.json", VISIT_PERSON);
    Command::cargo_bin("shape-index")
        .unwrap()
        .arg("--config-dir")
        .arg(ws.root.path().join("config"))
        .arg("index")
        .arg(&record)
        .assert()
        .success();
    assert!(ws.root.path().join("store").join("wards.json").is_file());
}

#[test]
fn corrupt_settings_are_reported() {
    let ws = Workspace::new();
    let config = ws.root.path().join("config");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(config.join("index.json"), b"{not json").unwrap();
    ws.cmd()
        .args(["explain", "--contains", "Visit"])
        .assert()
        .success()
        .stderr(predicate::str::contains("CONFIG_INVALID"));
}

#[test]
fn empty_chain_fails() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_QUERY"));
}

#[test]
fn malformed_record_fails_with_structure_error() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    let bad = ws.record("bad.json", r#"{"ehr_data": {}}"#);
    ws.cmd()
        .arg("index")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_STRUCTURE"));
}

#[test]
fn missing_scope_is_reported() {
    let ws = Workspace::new();
    let record = ws.record("r.json", VISIT_PERSON);
    ws.cmd()
        .arg("index")
        .arg(&record)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SCOPE_NOT_FOUND"));
}

#[test]
fn concurrent_processes_keep_every_structure() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    let bin = assert_cmd::cargo::cargo_bin("shape-index");
    let children: Vec<_> = (0..16)
        .map(|i| {
            let file = ws.record(
                &format!("r{i}.json"),
                &format!(r#"{{"archetype": "C{i}", "ehr_data": {{}}}}"#),
            );
            std::process::Command::new(&bin)
                .arg("--store-dir")
                .arg(ws.root.path().join("store"))
                .arg("--config-dir")
                .arg(ws.root.path().join("config"))
                .arg("index")
                .arg(file)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        })
        .collect();

    let mut printed = BTreeSet::new();
    for child in children {
        let out = child.wait_with_output().unwrap();
        assert!(
            out.status.success(),
            "{}",
            String::from_utf8_lossy(&out.stderr)
        );
        let line = String::from_utf8(out.stdout).unwrap();
        printed.insert(line.trim().rsplit('\t').next().unwrap().to_owned());
    }
    assert_eq!(printed.len(), 16);

    let out = ws.cmd().arg("list").output().unwrap();
    assert!(out.status.success());
    let stored: BTreeSet<String> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|line| line.split('\t').next().unwrap().to_owned())
        .collect();
    assert_eq!(stored, printed);
}
