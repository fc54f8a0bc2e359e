// Integration tests for the torflux binary: exit codes, console echo and
// the audit log it leaves in the working directory.

mod common;

use common::{unused_port, Behavior, FakeControlPort};
use std::fs;
use std::path::Path;
use std::process::{Output, Stdio};
use tempfile::TempDir;
use tokio::process::Command;

const LOG_PATH: &str = "log/tor_circuit_refresh_log.txt";

fn torflux(work_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_torflux"));
    cmd.current_dir(work_dir)
        .env_remove("VANGUARD")
        .env_remove("RUST_LOG");
    cmd
}

fn write_settings(work_dir: &Path, ports: &[u16]) -> std::path::PathBuf {
    let path = work_dir.join("torflux.toml");
    let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
    fs::write(
        &path,
        format!(
            "[control]\nendpoints = [{}]\nsocket_timeout = \"2s\"\n",
            ports.join(", ")
        ),
    )
    .unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test]
async fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path()).arg("--help").output().await.unwrap();

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Rotate Tor circuits"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--settings"));
    assert!(stdout.contains("--action"));
}

#[tokio::test]
async fn test_cli_missing_credential_exits_1() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path()).output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("(VANGUARD) is not set or empty"));

    let log = fs::read_to_string(temp_dir.path().join(LOG_PATH)).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("VANGUARD"));
}

#[tokio::test]
async fn test_cli_empty_credential_exits_1() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path())
        .env("VANGUARD", "")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_cli_refresh_happy_path() {
    let temp_dir = TempDir::new().unwrap();
    let main = FakeControlPort::start(Behavior::healthy()).await;
    let dns = FakeControlPort::start(Behavior::healthy()).await;
    let settings = write_settings(temp_dir.path(), &[main.port(), dns.port()]);

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));

    // Only session start and end are echoed
    let stdout = stdout(&output);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("Starting Tor circuit refresh..."));
    assert!(stdout.contains("Tor circuit refresh completed."));

    let log = fs::read_to_string(temp_dir.path().join(LOG_PATH)).unwrap();
    assert_eq!(log.matches("BUILT").count(), 2);
}

#[tokio::test]
async fn test_cli_failed_endpoints_exit_0_unless_strict() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path(), &[unused_port()]);

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .output()
        .await
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .arg("--strict")
        .output()
        .await
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_cli_reload_main() {
    let temp_dir = TempDir::new().unwrap();
    let main = FakeControlPort::start(Behavior::healthy()).await;
    let settings = write_settings(temp_dir.path(), &[main.port(), unused_port()]);

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .args(["--config", "main"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("HUP signal sent successfully"));
    assert_eq!(main.commands().last().map(String::as_str), Some("SIGNAL HUP"));
}

#[tokio::test]
async fn test_cli_reload_failure_exits_1() {
    let temp_dir = TempDir::new().unwrap();
    let settings = write_settings(temp_dir.path(), &[unused_port(), unused_port()]);

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .args(["--config", "dns"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_cli_bad_settings_file_exits_1() {
    let temp_dir = TempDir::new().unwrap();
    let settings = temp_dir.path().join("torflux.toml");
    fs::write(&settings, "[control]\nendpoints = []\n").unwrap();

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least one control endpoint"));
}

#[tokio::test]
async fn test_cli_print_default_settings() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path())
        .arg("--print-default-settings")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("endpoints = [9051, 9054]"));
    assert!(stdout.contains("socket_timeout = \"5s\""));
    assert!(!temp_dir.path().join("log").exists());
}

#[tokio::test]
async fn test_cli_closed_stdout_still_writes_audit_log() {
    let temp_dir = TempDir::new().unwrap();
    let mut child = torflux(temp_dir.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    drop(child.stdout.take());

    let output = child.wait_with_output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    let log = fs::read_to_string(temp_dir.path().join(LOG_PATH)).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("(VANGUARD) is not set or empty"));
}

#[tokio::test]
async fn test_cli_single_dash_config_and_action() {
    let temp_dir = TempDir::new().unwrap();
    let main = FakeControlPort::start(Behavior::healthy()).await;
    let dns = FakeControlPort::start(Behavior::healthy()).await;
    let settings = write_settings(temp_dir.path(), &[main.port(), dns.port()]);

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .args(["-config", "dns", "-action", "stop"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("stopped successfully"));
    assert_eq!(main.accepted(), 0);
    assert_eq!(dns.commands().last().map(String::as_str), Some("SIGNAL HALT"));

    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .arg("--settings")
        .arg(&settings)
        .args(["-config", "main"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(main.commands().last().map(String::as_str), Some("SIGNAL HUP"));
}

#[tokio::test]
async fn test_cli_invalid_config_type_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .args(["-config", "bridge"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Invalid config type. Use 'main' or 'dns'."));

    let log = fs::read_to_string(temp_dir.path().join(LOG_PATH)).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("[TOR-FLUX] [ERROR] Invalid config type. Use 'main' or 'dns'."));
}

#[tokio::test]
async fn test_cli_invalid_action_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let output = torflux(temp_dir.path())
        .env("VANGUARD", "hunter2")
        .args(["--config", "main", "--action", "restart"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let log = fs::read_to_string(temp_dir.path().join(LOG_PATH)).unwrap();
    assert!(log.contains("Invalid action. Use 'start', 'stop', 'hup', or 'newnym'."));
}
