//! Integration tests for the `creskit` CLI binary.
//!
//! Argument parsing, config handling and error exit codes run without a
//! controller; the get/set tests stand up a throwaway TCP peer.
#![allow(clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `creskit` binary with env isolation.
///
/// Clears all `CRESKIT_*` env vars and points the config file at `config`
/// so tests never touch the user's real configuration.
fn creskit_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("creskit");
    cmd.env("CRESKIT_CONFIG", config)
        .env("HOME", "/tmp/creskit-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/creskit-cli-test-nonexistent")
        .env_remove("CRESKIT_HOST")
        .env_remove("CRESKIT_PORT")
        .env_remove("CRESKIT_OUTPUT")
        .env_remove("CRESKIT_RETRY_INTERVAL_MS")
        .env_remove("CRESKIT_MAX_RETRIES")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn accessories_config(dir: &tempfile::TempDir, port: u16) -> PathBuf {
    write_config(
        dir,
        &format!(
            r#"
host = "127.0.0.1"
port = {port}
connect_timeout_secs = 5
max_connect_attempts = 1

[[accessories]]
type = "Lightbulb"
id = 5
name = "Kitchen"

[[accessories]]
type = "MultiSpeedFan"
id = 2
name = "Bedroom Fan"

[[accessories]]
type = "GarageDoorOpener"
id = "north"
name = "Garage"
"#
        ),
    )
}

/// A one-connection controller: collects everything the client sends and
/// answers the first frame containing `trigger` with `reply`.
fn fake_controller(trigger: &'static str, reply: &'static str) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut seen = String::new();
        let mut answered = false;
        let mut buf = [0u8; 512];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
            if !answered && !trigger.is_empty() && seen.contains(trigger) {
                stream.write_all(reply.as_bytes()).unwrap();
                answered = true;
            }
        }
        seen
    });
    (port, handle)
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = creskit_cmd(&dir.path().join("none.toml")).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in:\n{stderr}");
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    creskit_cmd(&dir.path().join("none.toml"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("CresKit")
                .and(predicate::str::contains("run"))
                .and(predicate::str::contains("get"))
                .and(predicate::str::contains("points")),
        );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    creskit_cmd(&dir.path().join("none.toml"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("creskit"));
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    creskit_cmd(&dir.path().join("none.toml"))
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("creskit"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    creskit_cmd(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    creskit_cmd(&path).args(["config", "init"]).assert().success();
    assert!(path.exists());

    creskit_cmd(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("port = 41794")
                .and(predicate::str::contains("[[accessories]]")),
        );
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "host = \"keep.me\"\n");

    creskit_cmd(&path)
        .args(["config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));
    assert!(std::fs::read_to_string(&path).unwrap().contains("keep.me"));

    creskit_cmd(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
    assert!(!std::fs::read_to_string(&path).unwrap().contains("keep.me"));
}

#[test]
fn test_config_show_applies_host_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "host = \"file.lan\"\nport = 41794\n");
    creskit_cmd(&path)
        .args(["-o", "json", "--host", "flag.lan", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"host\": \"flag.lan\""));
}

// ── Points ──────────────────────────────────────────────────────────

#[test]
fn test_points_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, 41794);
    creskit_cmd(&path).arg("points").assert().success().stdout(
        predicate::str::contains("Kitchen")
            .and(predicate::str::contains("RotationSpeed"))
            .and(predicate::str::contains("eventGarageDoorState")),
    );
}

#[test]
fn test_points_json_carries_serial() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, 41794);
    let output = creskit_cmd(&path)
        .args(["points", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 3);
    assert_eq!(listing[0]["serial_number"], "CK Lightbulb ID 5");
    assert_eq!(listing[2]["id"], "north");
}

#[test]
fn test_points_plain_lists_topics() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, 41794);
    creskit_cmd(&path)
        .args(["ls", "-o", "plain"])
        .assert()
        .success()
        .stdout("Lightbulb:5\nMultiSpeedFan:2\nGarageDoorOpener:north\n");
}

#[test]
fn test_unknown_accessory_type_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[[accessories]]\ntype = \"Toaster\"\nid = 1\nname = \"Bread\"\n",
    );
    creskit_cmd(&path)
        .arg("points")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Toaster"));
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_get_without_host_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.toml");
    creskit_cmd(&path)
        .args(["get", "Lightbulb", "5", "PowerState"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("host"));
}

#[test]
fn test_unknown_characteristic_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, 41794);
    creskit_cmd(&path)
        .args(["get", "Lightbulb", "5", "Brightness"])
        .assert()
        .code(2);
}

#[test]
fn test_out_of_range_set_is_rejected_offline() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, closed_port());
    creskit_cmd(&path)
        .args(["set", "Lightbulb", "5", "PowerState", "7"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_connection_refused_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, closed_port());
    creskit_cmd(&path)
        .args(["get", "Lightbulb", "5", "PowerState"])
        .assert()
        .code(4);
}

// ── Against a controller ────────────────────────────────────────────

#[test]
fn test_get_prints_controller_answer() {
    let (port, controller) = fake_controller(
        "MultiSpeedFan:2:getRotationSpeed:*",
        "MultiSpeedFan:2:getRotationSpeed:50*",
    );
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, port);

    creskit_cmd(&path)
        .args(["-o", "plain", "get", "MultiSpeedFan", "2", "RotationSpeed"])
        .assert()
        .success()
        .stdout("50\n");

    let seen = controller.join().unwrap();
    assert!(seen.starts_with("MultiSpeedFan:2:getRotationSpeed:*"));
}

#[test]
fn test_get_times_out_without_answer() {
    let (port, controller) = fake_controller("", "");
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, port);

    creskit_cmd(&path)
        .args(["get", "Lightbulb", "5", "PowerState", "--timeout", "1"])
        .assert()
        .code(5);
    controller.join().unwrap();
}

#[test]
fn test_set_writes_frame() {
    let (port, controller) = fake_controller("", "");
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, port);

    creskit_cmd(&path)
        .args(["-o", "plain", "set", "Lightbulb", "5", "PowerState", "1"])
        .assert()
        .success()
        .stdout("sent\n");

    assert_eq!(controller.join().unwrap(), "Lightbulb:5:setPowerState:1*");
}

#[test]
fn test_set_unconfigured_point() {
    let (port, controller) = fake_controller("", "");
    let dir = tempfile::tempdir().unwrap();
    let path = accessories_config(&dir, port);

    creskit_cmd(&path)
        .args(["set", "Lightbulb", "99", "PowerState", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not configured"));
    controller.join().unwrap();
}
