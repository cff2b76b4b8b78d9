// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Command-line behaviour that needs no container runtime

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
version: "1"
images:
  app:
    repository: team/app:ci
stacks:
  it:
    files: [compose.yml]
    project: app-it
registries:
  prod:
    host: registry.example.com
    namespace: release
actions:
  integration:
    type: command
    command: make integration
pipelines:
  - name: release
    description: Build, test and publish the app
    build:
      image: app
    test:
      stack: it
      action: integration
    on_success:
      tags: [stable]
      publish:
        targets:
          - registry: prod
    on_failure:
      tags: [failed]
    always:
      remove_images: true
"#;

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".shipflow.yaml"), config).unwrap();
    dir
}

fn shipflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shipflow").unwrap();
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env_remove("SHIPFLOW_FILE")
        .env_remove("SHIPFLOW_DOCKER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_validate_accepts_config() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_validate_reports_missing_action() {
    let dir = project(&CONFIG.replace("action: integration", "action: smoke"));
    shipflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Action 'smoke' not found"));
}

#[test]
fn test_validate_without_config() {
    let dir = TempDir::new().unwrap();
    shipflow(&dir).arg("validate").assert().failure();
}

#[test]
fn test_list_shows_pipelines() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("test@it"));
}

#[test]
fn test_run_unknown_pipeline() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .args(["run", "nightly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not defined"));
}

#[test]
fn test_run_dry_run_does_not_execute() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .args(["run", "release", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline: release"))
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_dry_run_fills_plan_cache() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .args(["run", "release", "--dry-run"])
        .assert()
        .success();

    shipflow(&dir)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:  1"));
}

#[test]
fn test_directory_flag() {
    let dir = project(CONFIG);
    let elsewhere = TempDir::new().unwrap();
    shipflow(&elsewhere)
        .arg("-C")
        .arg(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("release"));
}

#[test]
fn test_env_unknown_stack() {
    let dir = project(CONFIG);
    shipflow(&dir)
        .args(["--docker", "true", "env", "ps", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stack 'staging' is not declared"));
}
