//! CLI surface tests against the real utica binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn utica_cmd() -> Command {
    Command::cargo_bin("utica").unwrap()
}

#[test]
fn test_help_output() {
    utica_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dependency manager"))
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("checkout"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_version_output() {
    utica_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_command_fails() {
    utica_cmd()
        .arg("unknown")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_update_without_cartfile_fails() {
    let temp = TempDir::new().unwrap();
    utica_cmd()
        .args(["update", "--no-checkout"])
        .arg("--project-directory")
        .arg(temp.path())
        .env("UTICA_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cartfile not found"));
}

#[test]
fn test_build_without_lockfile_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Cartfile"), "github \"a/b\"\n").unwrap();
    utica_cmd()
        .arg("build")
        .arg("--project-directory")
        .arg(temp.path())
        .env("UTICA_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cartfile.resolved not found"));
}

#[test]
fn test_update_reports_parse_errors_verbatim() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Cartfile"), "github Whatsthis\n").unwrap();
    utica_cmd()
        .args(["update", "--no-checkout"])
        .arg("--project-directory")
        .arg(temp.path())
        .env("UTICA_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "expected string after dependency type",
        ));
}

#[test]
fn test_duplicate_across_manifests_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Cartfile"), "github \"a/b\"\n").unwrap();
    std::fs::write(temp.path().join("Cartfile.private"), "github \"a/b\"\n").unwrap();
    utica_cmd()
        .args(["update", "--no-checkout"])
        .arg("--project-directory")
        .arg(temp.path())
        .env("UTICA_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate dependencies"));
}
