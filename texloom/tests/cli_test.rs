//! CLI integration tests for the `texloomd` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn help_describes_subcommands() {
    Command::cargo_bin("texloomd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("signal"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn status_on_unknown_project_fails_with_not_found() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("texloom.yml");
    std::fs::write(
        &config_path,
        format!("store:\n  path: {}\n", dir.path().join("store").display()),
    )
    .unwrap();

    Command::cargo_bin("texloomd")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "status", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
