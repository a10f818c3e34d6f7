//! Integration tests for the `xstorage` CLI binary.
//!
//! Argument parsing, help output, completions and error exit codes run
//! without a device; the end-to-end tests talk to a wiremock device.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `xstorage` binary with env isolation.
///
/// Clears all `XSTORAGE_*` env vars and points config and data
/// directories at `home` so tests never touch the user's real profile,
/// keyring-less token files included.
fn xstorage_cmd(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("xstorage");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("XSTORAGE_PROFILE")
        .env_remove("XSTORAGE_HOST")
        .env_remove("XSTORAGE_OUTPUT")
        .env_remove("XSTORAGE_INSECURE")
        .env_remove("XSTORAGE_TIMEOUT")
        .env_remove("XSTORAGE_INVERTER_SERIAL")
        .env_remove("XSTORAGE_USERNAME")
        .env_remove("XSTORAGE_PASSWORD");
    cmd
}

fn isolated() -> (tempfile::TempDir, assert_cmd::Command) {
    let home = tempfile::tempdir().unwrap();
    let cmd = xstorage_cmd(home.path());
    (home, cmd)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn grant() -> Value {
    json!({
        "successful": true,
        "result": { "token": "tok-cli", "refreshToken": "ref-cli", "expiresIn": 3600 }
    })
}

/// A customer-account device: sign-in, a status with a battery level,
/// and every other read endpoint answering a generic body.
async fn mock_device() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/device/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "successful": true,
            "result": {"energyFlow": {"stateOfCharge": 72}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/device"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "successful": true,
            "result": {"inverterModelName": "X", "firmwareVersion": "1.4.2", "inverterSerialNumber": "BJ2K4000"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"successful": true, "result": {"ok": true}})))
        .mount(&server)
        .await;
    server
}

/// Run `cmd` off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap()).await.unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let (_home, mut cmd) = isolated();
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let (_home, mut cmd) = isolated();
    cmd.arg("--help").assert().success().stdout(
        predicate::str::contains("xStorage Home")
            .and(predicate::str::contains("snapshot"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("notifications")),
    );
}

#[test]
fn test_version_flag() {
    let (_home, mut cmd) = isolated();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xstorage"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let (_home, mut cmd) = isolated();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let (_home, mut cmd) = isolated();
    cmd.args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Usage errors ────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let (_home, mut cmd) = isolated();
    let output = cmd.arg("frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_output_format() {
    let (_home, mut cmd) = isolated();
    let output = cmd.args(["--output", "xml", "snapshot"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("xml"));
}

#[test]
fn test_power_requires_state() {
    let (_home, mut cmd) = isolated();
    let output = cmd.args(["power", "sideways"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_missing_config_fails() {
    let (_home, mut cmd) = isolated();
    let output = cmd.arg("snapshot").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("No device configured"));
}

#[test]
fn test_unknown_profile_fails() {
    let (_home, mut cmd) = isolated();
    let output = cmd.args(["--profile", "cabin", "snapshot"]).output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("cabin"));
}

#[test]
fn test_missing_password_is_auth_error() {
    let (_home, mut cmd) = isolated();
    let output = cmd
        .args(["--host", "127.0.0.1:9", "--username", "owner", "--account-type", "customer", "snapshot"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[test]
fn test_technician_without_serial_is_usage_error() {
    let (_home, mut cmd) = isolated();
    let output = cmd
        .env("XSTORAGE_PASSWORD", "pw")
        .args(["--host", "127.0.0.1:9", "--username", "tech", "--account-type", "tech", "snapshot"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("inverter_serial"));
}

// ── Against a mock device ───────────────────────────────────────────

fn device_cmd(home: &std::path::Path, server: &MockServer, args: &[&str]) -> assert_cmd::Command {
    let uri = server.uri();
    let mut cmd = xstorage_cmd(home);
    cmd.env("XSTORAGE_PASSWORD", "hunter2")
        .args(["--host", uri.as_str(), "--username", "owner", "--account-type", "customer"])
        .args(args);
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn test_snapshot_json_against_device() {
    let server = mock_device().await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["-o", "json", "snapshot"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["status"]["energyFlow"]["stateOfCharge"], json!(72));
    assert_eq!(doc["settings"], json!({"ok": true}));
    assert!(doc.get("technical_status").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_snapshot_path_prints_one_value() {
    let server = mock_device().await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(
        home.path(),
        &server,
        &["-o", "json-compact", "snapshot", "--path", "status.energyFlow.stateOfCharge"],
    ))
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "72");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_credentials_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "successful": false,
            "error": {"errCode": 2, "description": "wrong credentials"}
        })))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["snapshot"])).await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Authentication failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_required_endpoint_failure_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/device/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"ok": true}})))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["snapshot"])).await;

    assert_eq!(output.status.code(), Some(8), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("status"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_power_off_posts_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/device/power"))
        .and(body_json(json!({"parameters": {"state": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"successful": true})))
        .expect(1)
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["power", "off"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("switched off"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_command_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/device/command"))
        .and(body_json(json!({
            "command": "SET_CHARGE",
            "duration": 30,
            "parameters": {"power": 2000}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"successful": false, "error": "busy"})))
        .expect(1)
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(
        home.path(),
        &server,
        &["command", "SET_CHARGE", "--duration", "30", "--param", "power=2000"],
    ))
    .await;

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("busy"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_saves_profile_and_config_defaults_apply() {
    let server = mock_device().await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["-o", "json", "login", "--save-profile"])).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    let config_file = std::path::PathBuf::from(summary["saved_to"].as_str().unwrap());

    let saved = std::fs::read_to_string(&config_file).unwrap();
    assert!(saved.contains(&server.uri()), "{saved}");
    assert!(saved.contains("account_type = \"customer\""), "{saved}");
    assert!(!saved.contains("hunter2"), "password must stay out of the file");

    std::fs::write(&config_file, saved.replace("output = \"table\"", "output = \"json\"")).unwrap();

    // No --host, --username or --output: everything comes from the file.
    let mut cmd = xstorage_cmd(home.path());
    cmd.env("XSTORAGE_PASSWORD", "hunter2").arg("snapshot");
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["status"]["energyFlow"]["stateOfCharge"], json!(72));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_reports_failed_first_cycle_and_keeps_going() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/.+"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = run(device_cmd(home.path(), &server, &["watch", "--interval", "1", "--count", "1"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no data from status, device"), "{stderr}");
}
