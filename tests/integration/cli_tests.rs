//! CLI surface tests: argument validation, configuration errors, and the
//! fail-fast build path (no network required).

#![allow(clippy::expect_used, deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn strato() -> Command {
    Command::cargo_bin("strato").expect("strato binary should exist")
}

/// Write a deployment config into `<dir>/config/deployment.yaml`.
fn write_config(dir: &TempDir, body: &str) {
    let config_dir = dir.path().join("config");
    std::fs::create_dir_all(&config_dir).expect("create config dir");
    std::fs::write(config_dir.join("deployment.yaml"), body).expect("write deployment.yaml");
}

/// Write a credentials file and return its path for `STRATO_CREDENTIALS`.
fn write_credentials(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("credentials.yaml");
    std::fs::write(
        &path,
        concat!(
            "profiles:\n",
            "  work:\n",
            "    host: http://127.0.0.1:1\n",
            "    token: test-token\n",
            "    username: dev@example.com\n",
        ),
    )
    .expect("write credentials");
    path
}

const BASIC_CONFIG: &str = r#"
common:
  build:
    package_command: ["definitely-missing-build-tool"]
    package_output_dir: dist
    bundle_command: ["definitely-missing-build-tool"]
    bundle_dir: frontend/dist
environments:
  production:
    app_name: demo
    workspace_path: /Workspace/apps/demo
    compute_size: MEDIUM
    database:
      instance_name: demo-db
"#;

// ── Argument validation ──────────────────────────────────────────────────────

#[test]
fn help_lists_all_actions() {
    strato()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn no_arguments_shows_usage() {
    strato().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn create_requires_env_and_profile() {
    strato()
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--env"))
        .stderr(predicate::str::contains("--profile"));
}

#[test]
fn version_flag_works() {
    strato()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("strato"));
}

// ── Configuration errors ─────────────────────────────────────────────────────

#[test]
fn unknown_profile_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    write_config(&dir, BASIC_CONFIG);
    let credentials = write_credentials(&dir);

    strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "production", "--profile", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown profile"))
        .stderr(predicate::str::contains("work"));
}

#[test]
fn unknown_environment_lists_available() {
    let dir = TempDir::new().expect("tempdir");
    write_config(&dir, BASIC_CONFIG);
    let credentials = write_credentials(&dir);

    strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "staging", "--profile", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown environment"))
        .stderr(predicate::str::contains("production"));
}

#[test]
fn invalid_compute_size_is_rejected_at_load() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
environments:
  production:
    app_name: demo
    workspace_path: /Workspace/apps/demo
    compute_size: COLOSSAL
    database:
      instance_name: demo-db
"#,
    );
    let credentials = write_credentials(&dir);

    strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "production", "--profile", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COLOSSAL"))
        .stderr(predicate::str::contains("MEDIUM"));
}

#[test]
fn missing_database_name_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
environments:
  production:
    app_name: demo
    workspace_path: /Workspace/apps/demo
    database:
      capacity: CU_1
"#,
    );
    let credentials = write_credentials(&dir);

    strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "production", "--profile", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database.instance_name"));
}

// ── Fail-fast build path ─────────────────────────────────────────────────────

#[test]
fn build_failure_fails_the_run_before_any_remote_call() {
    let dir = TempDir::new().expect("tempdir");
    write_config(&dir, BASIC_CONFIG);
    let credentials = write_credentials(&dir);

    strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "production", "--profile", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("phase 'build' failed"));
}

#[test]
fn json_mode_emits_the_report_as_json() {
    let dir = TempDir::new().expect("tempdir");
    write_config(&dir, BASIC_CONFIG);
    let credentials = write_credentials(&dir);

    let output = strato()
        .current_dir(dir.path())
        .env("STRATO_CREDENTIALS", &credentials)
        .args(["create", "--env", "production", "--profile", "work", "--json"])
        .output()
        .expect("run strato");
    assert!(!output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
    assert_eq!(report["action"], "create");
    assert_eq!(report["app_name"], "demo");
    let results = report["results"].as_array().expect("results array");
    let build = results
        .iter()
        .find(|r| r["phase"] == "build")
        .expect("build phase present");
    assert_eq!(build["error"]["kind"], "BuildError");
}
