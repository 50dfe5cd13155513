//! CLI smoke tests for bramble.
//!
//! These tests run the binary against temporary workspaces and check exit codes
//! and the lines it prints.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the bramble binary, isolated from the caller's environment.
fn bramble_cmd(workspace: &Path) -> Command {
  let mut cmd = cargo_bin_cmd!("bramble");
  cmd
    .current_dir(workspace)
    .env_remove("BRAMBLE_PACKAGE_PATH")
    .env_remove("BRAMBLE_DELETED_PACKAGES")
    .env_remove("BRAMBLE_JOBS")
    .env_remove("RUST_LOG");
  cmd
}

fn workspace(files: &[&str]) -> TempDir {
  let temp = TempDir::new().unwrap();
  for file in files {
    let path = temp.path().join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "").unwrap();
  }
  temp
}

fn canonical(path: &Path) -> PathBuf {
  std::fs::canonicalize(path).unwrap()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  let temp = TempDir::new().unwrap();
  bramble_cmd(temp.path())
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let temp = TempDir::new().unwrap();
  bramble_cmd(temp.path())
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("bramble"));
}

#[test]
fn subcommand_help_works() {
  let temp = TempDir::new().unwrap();
  for cmd in &["lookup", "workspace", "info"] {
    bramble_cmd(temp.path())
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn lookup_finds_package() {
  let temp = workspace(&["foo/BUILD"]);
  let root = canonical(temp.path());

  bramble_cmd(temp.path())
    .args(["lookup", "//foo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("//foo").and(predicate::str::contains(root.display().to_string())));
}

#[test]
fn lookup_missing_package_fails() {
  let temp = workspace(&["foo/BUILD"]);

  bramble_cmd(temp.path())
    .args(["lookup", "foo", "bar"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("BUILD file not found on package path"))
    .stderr(predicate::str::contains("1 of 2 package(s) could not be found"));
}

#[test]
fn lookup_invalid_name_fails() {
  let temp = TempDir::new().unwrap();

  bramble_cmd(temp.path())
    .args(["lookup", "foo//bar"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid package name 'foo//bar'"));
}

#[test]
fn lookup_json_output() {
  let temp = workspace(&["a/BUILD"]);

  let output = bramble_cmd(temp.path())
    .args(["--format", "json", "lookup", "a", "b"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(reports[0]["package"], "//a");
  assert_eq!(reports[0]["status"], "found");
  assert_eq!(reports[0]["exists"], true);
  assert_eq!(reports[1]["status"], "not_found");
  assert_eq!(reports[1]["exists"], false);
}

#[test]
fn package_path_flag_orders_roots() {
  let temp = workspace(&["r1/a/BUILD", "r2/a/BUILD"]);
  let r2 = canonical(&temp.path().join("r2"));

  bramble_cmd(temp.path())
    .args(["--package-path", "%workspace%/r2:%workspace%/r1", "lookup", "a"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r2.display().to_string()));
}

#[test]
fn deleted_packages_flag_hides_package() {
  let temp = workspace(&["a/BUILD"]);

  bramble_cmd(temp.path())
    .args(["--deleted-packages", "a", "lookup", "a"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("deleted packages setting"));
}

#[test]
fn deleted_packages_env_hides_package() {
  let temp = workspace(&["a/BUILD"]);

  bramble_cmd(temp.path())
    .env("BRAMBLE_DELETED_PACKAGES", "a")
    .args(["lookup", "a"])
    .assert()
    .failure();
}

#[test]
fn config_file_declares_repository() {
  let temp = workspace(&["third_party/foo/BUILD", "WORKSPACE"]);
  std::fs::write(
    temp.path().join("bramble.toml"),
    "[repositories.foo]\npath = \"third_party/foo\"\n",
  )
  .unwrap();
  let repo = canonical(&temp.path().join("third_party/foo"));

  bramble_cmd(temp.path())
    .args(["lookup", "@foo//"])
    .assert()
    .success()
    .stdout(predicate::str::contains(repo.display().to_string()));
}

#[test]
fn undeclared_repository_fails() {
  let temp = TempDir::new().unwrap();

  bramble_cmd(temp.path())
    .args(["lookup", "@nope//x"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("repository not declared"));
}

#[test]
fn invalid_config_reports_path() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("bramble.toml"), "unknown_key = 1\n").unwrap();

  bramble_cmd(temp.path())
    .args(["lookup", "a"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("bramble.toml"));
}

// =============================================================================
// Workspace & Info
// =============================================================================

#[test]
fn workspace_prints_marker_root() {
  let temp = workspace(&["WORKSPACE"]);
  let root = canonical(temp.path());

  bramble_cmd(temp.path())
    .arg("workspace")
    .assert()
    .success()
    .stdout(predicate::str::contains(root.display().to_string()));
}

#[test]
fn info_reports_jobs_flag() {
  let temp = TempDir::new().unwrap();

  bramble_cmd(temp.path())
    .args(["-j", "3", "info"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Jobs").and(predicate::str::contains("3")));
}

#[test]
fn info_json_output() {
  let temp = TempDir::new().unwrap();

  let output = bramble_cmd(temp.path())
    .args(["--format", "json", "-j", "2", "info"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(config["jobs"], 2);
  assert_eq!(config["package_path"].as_array().unwrap().len(), 1);
}

#[test]
fn zero_jobs_is_rejected() {
  let temp = TempDir::new().unwrap();

  bramble_cmd(temp.path())
    .args(["-j", "0", "info"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("jobs must be at least 1"));
}
