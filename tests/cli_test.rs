#![allow(deprecated)]

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("kbadmin").unwrap();
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn test_init_config_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cmd = Command::cargo_bin("kbadmin").unwrap();
    cmd.arg("--config").arg(&path).arg("init-config");
    cmd.assert().success();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("refresh_interval_sec = 1500"));
    assert!(contents.contains("[backend.endpoints]"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session]\nrefresh_interval_sec = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("kbadmin").unwrap();
    cmd.arg("--config").arg(&path).arg("status");
    cmd.assert().failure();
}
