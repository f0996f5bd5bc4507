//! Integration tests for the `dnh` binary.
//!
//! Nothing here keeps a hub running: the tests cover argument parsing,
//! config inspection and startup failures.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `dnh` binary with env isolation.
///
/// Runs inside `cwd` so no stray `./config.json` is picked up, clears the
/// known `DNH_*` overrides and points config directories at a
/// nonexistent path.
fn dnh_cmd(cwd: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("dnh");
    cmd.current_dir(cwd)
        .env("HOME", "/tmp/dnh-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/dnh-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("DNH_BIND")
        .env_remove("DNH_HTTP_PORT")
        .env_remove("DNH_WS_PORT")
        .env_remove("DNH_PING_INTERVAL_SECS")
        .env_remove("DNH_OUTBOUND_QUEUE")
        .env_remove("DNH_VERBOSE")
        .env_remove("DNH_LOG_FILE");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = dnh_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("lab equipment")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_help_lists_port_flags() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--http-port")
                .and(predicate::str::contains("--ws-port"))
                .and(predicate::str::contains("--ping-interval")),
        );
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_dnh"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .arg("launch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("http_port = 5700")
                .and(predicate::str::contains("ws_port = 5701"))
                .and(predicate::str::contains("# source").not()),
        );
}

#[test]
fn test_config_show_picks_up_local_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir, "config.json", r#"{"ws_port": 6001}"#);
    dnh_cmd(dir.path())
        .env("DNH_HTTP_PORT", "7000")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("# source: config.json")
                .and(predicate::str::contains("ws_port = 6001"))
                .and(predicate::str::contains("http_port = 7000")),
        );
}

#[test]
fn test_config_check_accepts_valid_params() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "hub.toml",
        r#"
resetcmds = ["true"]

[[params]]
id = "level"
type = "int"
current = 3
"#,
    );
    dnh_cmd(dir.path())
        .args(["config", "check", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Config OK")
                .and(predicate::str::contains("1 params, 1 commands")),
        );
}

#[test]
fn test_config_check_rejects_bad_params() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "hub.json",
        r#"{"params": [
            {"id": "a", "type": "int", "current": 1},
            {"id": "a", "type": "int", "current": 2},
            {"id": "b"}
        ]}"#,
    );
    dnh_cmd(dir.path())
        .args(["config", "check", "-c"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(
            predicate::str::contains("params[1]: Param ID a already taken.")
                .and(predicate::str::contains("params[2]:"))
                .and(predicate::str::contains("2 param definition(s) were rejected")),
        );
}

#[test]
fn test_missing_config_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .args(["config", "show", "--config", "absent.json"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_malformed_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "hub.json", r#"{"ws_port": "many"}"#);
    dnh_cmd(dir.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .code(3);
}

// ── Run ─────────────────────────────────────────────────────────────

#[test]
fn test_run_rejects_clashing_ports() {
    let dir = tempfile::tempdir().unwrap();
    dnh_cmd(dir.path())
        .args(["run", "--http-port", "6100", "--ws-port", "6100"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must differ from http_port"));
}

#[test]
fn test_run_reports_busy_port() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    dnh_cmd(dir.path())
        .args(["run", "--bind", "127.0.0.1", "--ws-port", "0", "--http-port"])
        .arg(&port)
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Could not bind the HTTP listener"));
}
