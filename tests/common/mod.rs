#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Command;

use kaihistory::state::{AppCommand, IdentityUpdate, WorkspaceState};
use kaihistory::{AppState, SettingsStore, WorkspaceService};

pub fn have_git() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// One service over a throwaway workspace folder and a private settings file.
pub struct Fixture {
    pub td: tempfile::TempDir,
    pub root: PathBuf,
    pub service: WorkspaceService,
}

pub fn fixture() -> Fixture {
    let td = tempfile::tempdir().expect("tmpdir");
    let root = td.path().join("proj");
    std::fs::create_dir_all(&root).expect("mkdir proj");
    let service =
        WorkspaceService::new(SettingsStore::at_path(td.path().join("settings.json")));
    Fixture { td, root, service }
}

impl Fixture {
    pub fn set_identity(&self) {
        self.service
            .run_command(AppCommand::UpdateSettings {
                settings: IdentityUpdate {
                    user_name: "Alice".to_string(),
                    user_email: "alice@example.com".to_string(),
                },
            })
            .expect("update settings");
    }

    pub fn open(&self) -> AppState {
        self.service
            .run_command(AppCommand::OpenFolder {
                path: self.root.display().to_string(),
            })
            .expect("open folder")
    }

    /// Identity + open + initialize: lands in the ready/main state.
    pub fn init_project(&self) {
        self.set_identity();
        self.open();
        self.service
            .run_command(AppCommand::InitializeProject)
            .expect("initialize project");
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, content).expect("write file");
    }

    /// Drive git directly, bypassing the service, to simulate outside
    /// interference with the workspace.
    pub fn raw_git(&self, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {:?} failed", args);
    }

    pub fn workspace(&self) -> WorkspaceState {
        self.service.app_state().workspace
    }
}
