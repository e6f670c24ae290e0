// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the passbolt-setup binary

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Write a config whose host files live in `dir`
fn write_config(dir: &Path, os_id: Option<&str>) -> std::path::PathBuf {
    let os_release = dir.join("os-release");
    if let Some(id) = os_id {
        std::fs::write(&os_release, format!("PRETTY_NAME=\"Test Linux\"\nID={}\n", id)).unwrap();
    }

    let config_path = dir.join("passbolt-setup.toml");
    let content = format!(
        r#"[host]
os_release = "{}"
legacy_release = "{}"
"#,
        os_release.display(),
        dir.join("SuSE-release").display()
    );
    std::fs::write(&config_path, content).unwrap();
    config_path
}

/// Test the version command
#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("passbolt-setup v"))
        .stdout(predicate::str::contains("Passbolt CE"));
}

/// Test the help output
#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("docker"))
        .stdout(predicate::str::contains("packages"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_detect_quoted_identifier() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), Some("\"AlmaLinux\""));

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("detect");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Detected distribution: almalinux"));
}

#[test]
fn test_detect_legacy_suse_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), None);
    std::fs::write(temp_dir.path().join("SuSE-release"), "openSUSE 13.2\n").unwrap();

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("detect");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("opensuse"));
}

#[test]
fn test_detect_unsupported_distribution_fails() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), Some("gentoo"));

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("detect");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Distribution 'gentoo' not supported"));
}

#[test]
fn test_plan_for_detected_ubuntu() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), Some("ubuntu"));

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("plan");
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();

    let update = stdout.find("$ apt-get update -y").unwrap();
    let upgrade = stdout.find("$ apt-get upgrade -y").unwrap();
    let install = stdout
        .find("$ apt-get install -y curl gnupg apt-transport-https")
        .unwrap();
    let server = stdout.find("$ apt-get install -y passbolt-ce-server").unwrap();
    assert!(update < upgrade && upgrade < install && install < server);
}

#[test]
fn test_plan_container_mode_for_named_distro() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), None);

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config")
        .arg(&config_path)
        .args(["plan", "--mode", "container", "--distro", "rocky"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Plan for rocky (container mode)"))
        .stdout(predicate::str::contains("docker-compose-plugin"))
        .stdout(predicate::str::contains("systemctl enable --now docker"))
        .stdout(predicate::str::contains("passbolt-configure").not());
}

#[test]
fn test_init_creates_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("passbolt-setup.toml");

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    assert!(config_path.exists());
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[readiness]"));
    assert!(content.contains("timeout_secs = 60"));
}

#[test]
fn test_init_refuses_overwrite() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("passbolt-setup.toml");
    std::fs::write(&config_path, "# existing\n").unwrap();

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "# existing\n");
}

#[test]
fn test_init_then_show_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("passbolt-setup.toml");

    Command::cargo_bin("passbolt-setup")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("init")
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("config");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("app_service = \"passbolt\""))
        .stdout(predicate::str::contains("db_port = 3306"));
}

#[test]
fn test_show_config_defaults_without_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("missing.toml");

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("config");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No configuration file found"))
        .stdout(predicate::str::contains("[readiness]"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("passbolt-setup.toml");
    std::fs::write(&config_path, "[compose]\napp_service = \"db\"\ndb_service = \"db\"\n").unwrap();

    let mut cmd = Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).arg("detect");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_menu_exit() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), Some("debian"));

    let mut cmd = assert_cmd::Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).write_stdin("9\n0\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[1] Install via Docker"))
        .stdout(predicate::str::contains("Invalid option: '9'"))
        .stdout(predicate::str::contains("Goodbye."));
}

#[test]
fn test_menu_returns_after_failed_install() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), Some("gentoo"));

    let mut cmd = assert_cmd::Command::cargo_bin("passbolt-setup").unwrap();
    cmd.arg("--config").arg(&config_path).write_stdin("1\n\n0\n");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Distribution 'gentoo' not supported"))
        .stdout(predicate::str::contains("Press Enter to return to the menu"))
        .stdout(predicate::str::contains("Goodbye."));
}
