//! CLI integration tests for table-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no running database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

const CREDENTIAL_VARS: &[&str] = &[
    "SOURCE_DB_USERNAME",
    "SOURCE_DB_PASSWORD",
    "SOURCE_DB_DSN",
    "SOURCE_DB_SCHEMA",
    "SOURCE_DB_SSLMODE",
    "TARGET_DB_USERNAME",
    "TARGET_DB_PASSWORD",
    "TARGET_DB_DSN",
    "TARGET_DB_SCHEMA",
    "TARGET_DB_SSLMODE",
];

/// Get a command for the table-migrate binary with no inherited credentials.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("table-migrate").unwrap();
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("migration_config.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path.to_str().unwrap().to_string()
}

const VALID_CONFIG: &str = "\
tables:
  - name: users
  - name: orders
    mode: custom
    query: SELECT id, total FROM orders WHERE total > 0
    target_name: big_orders
";

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_lists_flags_with_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--no-progress"))
        .stdout(predicate::str::contains("--env-file"))
        .stdout(predicate::str::contains("[default: config/migration_config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("table-migrate"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_unknown_flag_exits_with_code_1() {
    // Usage errors must not look like connection failures (code 2).
    cmd()
        .arg("--workers")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_flag_missing_its_value_exits_with_code_1() {
    cmd().arg("--config").assert().code(1);
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["--config", "nonexistent_config_file.yaml"])
        .assert()
        .code(7);
}

#[test]
fn test_default_config_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .code(1);
}

#[test]
fn test_custom_mode_without_query_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "tables:\n  - name: orders\n    mode: custom\n");

    cmd()
        .current_dir(dir.path())
        .args(["--config", &config])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("query"));
}

#[test]
fn test_invalid_log_format_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), VALID_CONFIG);

    cmd()
        .current_dir(dir.path())
        .args(["--config", &config, "--log-format", "xml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("log format"));
}

#[test]
fn test_missing_credentials_exit_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), VALID_CONFIG);

    cmd()
        .current_dir(dir.path())
        .args(["--config", &config])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SOURCE_DB_USERNAME"));
}

#[test]
fn test_missing_env_file_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), VALID_CONFIG);

    cmd()
        .current_dir(dir.path())
        .args(["--config", &config, "--env-file", "missing.env"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("env file"));
}

// =============================================================================
// Exit Code Tests - Connection Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_unreachable_source_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), VALID_CONFIG);
    let env_file = dir.path().join("test.env");
    std::fs::write(
        &env_file,
        "\
SOURCE_DB_USERNAME=migrator
SOURCE_DB_PASSWORD=secret
SOURCE_DB_DSN=\"host=127.0.0.1 port=1 dbname=app connect_timeout=2\"
TARGET_DB_USERNAME=migrator
TARGET_DB_PASSWORD=secret
TARGET_DB_DSN=\"host=127.0.0.1 port=1 dbname=app connect_timeout=2\"
",
    )
    .unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["--config", &config, "--env-file", env_file.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source database"));
}
