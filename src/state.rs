//! Data model shared with the UI boundary.
//!
//! These types serialize to the JSON shapes the rendering layer consumes.
//! `WorkspaceState` is a closed union and is always recomputed from scratch,
//! never incrementally patched.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Which side of the workflow the repository is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceMode {
    Main,
    Work,
}

/// A candidate or active work, derived from its branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkInfo {
    pub branch: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One file from the status listing with its four independent facets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFile {
    pub path: String,
    pub staged: bool,
    pub unstaged: bool,
    pub untracked: bool,
    pub conflicted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
}

/// Status listing partitioned into the four summary buckets.
///
/// Priority: conflicted > untracked > staged/unstaged. A file with both a
/// staged and a further unstaged modification appears in both of the last
/// two buckets. Order follows the backend's native listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub staged: Vec<ChangeFile>,
    pub unstaged: Vec<ChangeFile>,
    pub untracked: Vec<ChangeFile>,
    pub conflicted: Vec<ChangeFile>,
}

impl ChangeSummary {
    pub fn classify(files: Vec<ChangeFile>) -> Self {
        let mut summary = ChangeSummary::default();
        for file in files {
            if file.conflicted {
                summary.conflicted.push(file);
            } else if file.untracked {
                summary.untracked.push(file);
            } else {
                if file.staged {
                    summary.staged.push(file.clone());
                }
                if file.unstaged {
                    summary.unstaged.push(file);
                }
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }
}

/// Remediation the user can take from an `Error` workspace state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationAction {
    ForceMain,
}

/// The closed set of workspace states. Exactly one variant is current at any
/// time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkspaceState {
    /// No folder chosen.
    Empty,
    /// The git tooling is absent from the host.
    GitMissing,
    /// Folder exists but is not yet a repository.
    #[serde(rename_all = "camelCase")]
    NeedsInit { path: String },
    /// Repository exists but lacks the permanent branch.
    #[serde(rename_all = "camelCase")]
    NoMain { path: String },
    /// Fully operational.
    #[serde(rename_all = "camelCase")]
    Ready {
        path: String,
        mode: WorkspaceMode,
        is_managed: bool,
        work: Option<WorkInfo>,
        work_candidates: Vec<WorkInfo>,
        changes: ChangeSummary,
        main_dirty: bool,
    },
    /// Unsupported layout or unrecoverable backend condition, with an
    /// explicit user-actionable remediation instead of a thrown error.
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<RemediationAction>,
    },
}

/// Combined snapshot returned by every query and command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppState {
    pub settings: Settings,
    pub workspace: WorkspaceState,
}

/// Which diff the viewer is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DiffMode {
    Staged,
    Unstaged,
    Untracked,
}

/// Classified diff payload; the presentation layer never inspects raw content
/// to decide how to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiffResult {
    Text { text: String },
    Binary { message: String },
    TooLarge { message: String },
    NotFound { message: String },
}

/// Identity fields accepted by the update-settings command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUpdate {
    pub user_name: String,
    pub user_email: String,
}

/// The command union the UI boundary accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppCommand {
    OpenFolder { path: String },
    InitializeProject,
    StartWork { name: String },
    ResumeWork,
    ResetMain,
    ForceMain,
    Stage { paths: Vec<String> },
    Unstage { paths: Vec<String> },
    Discard { paths: Vec<String> },
    DiscardAll,
    SaveHistory { message: Option<String> },
    CompleteWork,
    UpdateSettings { settings: IdentityUpdate },
    Refresh,
}
