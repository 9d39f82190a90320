mod common;

use std::path::Path;
use std::process::Command;

use common::have_git;

fn bin(settings: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kaihistory"))
        .arg("--settings-file")
        .arg(settings)
        .args(args)
        .output()
        .expect("run kaihistory binary")
}

#[test]
fn test_state_without_selection_prints_empty() {
    let td = tempfile::tempdir().expect("tmpdir");
    let settings = td.path().join("settings.json");

    let out = bin(&settings, &["state"]);
    assert!(out.status.success(), "stderr: {:?}", out.stderr);
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on stdout");
    assert_eq!(v["workspace"]["kind"], "empty");
}

#[test]
fn test_settings_round_trip_through_cli() {
    let td = tempfile::tempdir().expect("tmpdir");
    let settings = td.path().join("settings.json");

    let out = bin(
        &settings,
        &["settings", "--name", "Alice", "--email", "alice@example.com"],
    );
    assert!(out.status.success(), "stderr: {:?}", out.stderr);

    let out = bin(&settings, &["settings"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on stdout");
    assert_eq!(v["userName"], "Alice");
    assert_eq!(v["userEmail"], "alice@example.com");
}

#[test]
fn test_command_failure_prints_coded_error_on_stderr() {
    let td = tempfile::tempdir().expect("tmpdir");
    let settings = td.path().join("settings.json");

    let out = bin(&settings, &["start", "anything"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("workspace-not-ready"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_open_and_init_through_cli() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let td = tempfile::tempdir().expect("tmpdir");
    let settings = td.path().join("settings.json");
    let proj = td.path().join("proj");
    std::fs::create_dir_all(&proj).unwrap();
    let proj_arg = proj.display().to_string();

    let out = bin(
        &settings,
        &["settings", "--name", "Alice", "--email", "alice@example.com"],
    );
    assert!(out.status.success());

    let out = bin(&settings, &["open", &proj_arg]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on stdout");
    assert_eq!(v["workspace"]["kind"], "needs-init");

    // The recent-workspace entry keeps the selection across processes.
    let out = bin(&settings, &["init"]);
    assert!(out.status.success(), "stderr: {:?}", out.stderr);
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on stdout");
    assert_eq!(v["workspace"]["kind"], "ready");
    assert_eq!(v["workspace"]["mode"], "main");
    assert_eq!(v["workspace"]["isManaged"], true);
}
