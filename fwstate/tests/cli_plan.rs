use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn seed_store(dir: &Path) {
    fs::copy(
        fixture("fixtures/syslog_observed.xml"),
        dir.join("corp-syslog.xml"),
    )
    .expect("seed store");
}

#[test]
fn plan_reports_field_changes_in_text() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(fixture("fixtures/syslog_declared.toml"))
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 514 -> 1514"))
        .stdout(predicate::str::contains(
            "hosts: [10.0.0.1] -> [10.0.0.1, 10.0.0.2]",
        ))
        .stdout(predicate::str::contains("outcome=update changed=true fields=2"));
}

#[test]
fn plan_of_matching_state_is_unchanged() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(fixture("fixtures/syslog_unchanged.toml"))
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome=unchanged changed=false fields=0"));
}

#[test]
fn plan_json_includes_resolved_object() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    let output = cmd
        .arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(fixture("fixtures/syslog_declared.toml"))
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .arg("--format")
        .arg("json")
        .output()
        .expect("run");
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(plan["outcome"], "update");
    assert_eq!(plan["changed"], true);
    assert_eq!(plan["resolved"]["port"], "1514");
    assert_eq!(plan["resolved"]["description"], "corporate collector");
    assert_eq!(plan["observed"]["state"], "present");
}

#[test]
fn remove_strategy_override_applies_to_lists() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());
    let declared = dir.path().join("declared.toml");
    fs::write(&declared, "hosts = [\"10.0.0.1\"]\n").expect("declared");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(&declared)
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .arg("--strategy")
        .arg("remove")
        .assert()
        .success()
        .stdout(predicate::str::contains("hosts: [10.0.0.1] -> []"));
}

#[test]
fn plan_rejects_unknown_declared_fields() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());
    let declared = dir.path().join("declared.toml");
    fs::write(&declared, "protocol = \"udp\"\n").expect("declared");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(&declared)
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field protocol"));
}

#[test]
fn plan_requires_a_schema_source() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--declared")
        .arg(fixture("fixtures/syslog_declared.toml"))
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .assert()
        .failure();
}

#[test]
fn plan_json_masks_secret_values() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());
    let declared = dir.path().join("declared.toml");
    fs::write(&declared, "[auth]\npassword = \"hunter2\"\n").expect("declared");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    let output = cmd
        .arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(&declared)
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .arg("--format")
        .arg("json")
        .output()
        .expect("run");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf-8");
    assert!(!stdout.contains("hunter2"));
    let plan: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(plan["resolved"]["auth"]["password"], "(secret)");
    assert_eq!(plan["resolved"]["auth"]["username"], "collector");
}

#[test]
fn plan_detects_changed_field_of_named_server() {
    let dir = tempdir().expect("tempdir");
    seed_store(dir.path());
    let declared = dir.path().join("declared.toml");
    fs::write(
        &declared,
        "[[servers]]\n\"@name\" = \"primary\"\nserver = \"10.0.0.1\"\nport = \"1514\"\n",
    )
    .expect("declared");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fwstate"));
    cmd.arg("plan")
        .arg("--resource")
        .arg("syslog")
        .arg("--declared")
        .arg(&declared)
        .arg("--store")
        .arg(dir.path())
        .arg("--key")
        .arg("corp-syslog")
        .assert()
        .success()
        .stdout(predicate::str::contains("~ servers:"))
        .stdout(predicate::str::contains("outcome=update changed=true fields=1"));
}
