//! The workspace state machine and diff service.
//!
//! `WorkspaceService` owns the mutable repository context, recomputes the
//! `WorkspaceState` from scratch on every query, and serializes command
//! execution behind a mutex: interleaved git mutations on one working tree
//! are unsafe. State queries are read-only and idempotent.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::AppError;
use crate::git::{self, GitRepository, MAX_DIFF_CHARS};
use crate::pathguard;
use crate::settings::{Settings, SettingsStore};
use crate::state::{
    AppCommand, AppState, ChangeSummary, DiffMode, DiffResult, RemediationAction, WorkInfo,
    WorkspaceMode, WorkspaceState,
};
use crate::watcher::WorkspaceWatcher;
use crate::work::{self, WorkName, MAIN_BRANCH};

/// Repository-local marker that this tool owns workflow conventions here.
pub const MANAGED_KEY: &str = "kaihistory.managed";
/// Schema version of the managed conventions.
pub const SCHEMA_VERSION_KEY: &str = "kaihistory.version";
pub const SCHEMA_VERSION: &str = "1";

const INITIAL_COMMIT_MESSAGE: &str = "Project start";
const AUTO_SAVE_MESSAGE: &str = "Auto save before completion";

const GITIGNORE_TEMPLATE: &str = "# Settings for folders managed by kaihistory.\n";
const AGENTS_TEMPLATE: &str =
    "History in this folder is managed by kaihistory.\nTo begin editing, start a work in the app.\n";

const MSG_BINARY: &str = "Binary files cannot be displayed.";
const MSG_TOO_LARGE: &str = "Too many changes to display.";
const MSG_FILE_NOT_FOUND: &str = "File not found.";
const MSG_DIFF_UNAVAILABLE: &str = "Could not load the changes.";
const MSG_NO_CHANGES: &str = "No changes.";
const MSG_UNSUPPORTED_BRANCH: &str =
    "Cannot switch back to the review state. Discard the changes and try again.";

type Observers = Arc<Mutex<Vec<Box<dyn Fn() + Send>>>>;

fn notify_all(observers: &Observers) {
    for f in observers.lock().expect("observers lock").iter() {
        f();
    }
}

/// Lifecycle-bound to the currently open folder; re-created whenever the
/// resolved root changes.
struct RepoContext {
    root: PathBuf,
    git: GitRepository,
}

struct ServiceInner {
    selected_path: Option<PathBuf>,
    repo: Option<RepoContext>,
    watcher: WorkspaceWatcher,
}

pub struct WorkspaceService {
    settings: SettingsStore,
    inner: Mutex<ServiceInner>,
    observers: Observers,
}

impl WorkspaceService {
    pub fn new(settings: SettingsStore) -> Self {
        Self {
            settings,
            inner: Mutex::new(ServiceInner {
                selected_path: None,
                repo: None,
                watcher: WorkspaceWatcher::new(),
            }),
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a "state changed" observer. Observers are invoked after every
    /// command and on debounced filesystem changes.
    pub fn subscribe(&self, f: impl Fn() + Send + 'static) {
        self.observers
            .lock()
            .expect("observers lock")
            .push(Box::new(f));
    }

    /// The combined `{settings, workspace}` snapshot.
    pub fn app_state(&self) -> AppState {
        let mut inner = self.inner.lock().expect("service lock");
        let workspace = self.compute_state(&mut inner);
        // Settings re-read after computation: it may have updated recents.
        AppState {
            settings: self.settings.get(),
            workspace,
        }
    }

    /// Execute one command. On success or failure the state is recomputed
    /// and observers are notified, since the backend may have partially
    /// advanced.
    pub fn run_command(&self, command: AppCommand) -> Result<AppState, AppError> {
        let mut inner = self.inner.lock().expect("service lock");
        tracing::debug!(command = ?command, "run command");
        // Hydrate the selection and repository context first, so a command
        // arriving in a fresh process works off the recent-workspace entry.
        let _ = self.compute_state(&mut inner);
        let result = self.dispatch(&mut inner, command);
        if let Err(ref e) = result {
            tracing::debug!(code = e.code(), "command failed");
        }
        let workspace = self.compute_state(&mut inner);
        let settings = self.settings.get();
        drop(inner);
        notify_all(&self.observers);
        result.map(|()| AppState {
            settings,
            workspace,
        })
    }

    /// Resolve a `(path, mode)` request to a classified diff. Every failure
    /// past path validation degrades to a `DiffResult` variant; the diff
    /// viewer must never take down the workspace view.
    pub fn diff(&self, path: &str, mode: DiffMode) -> Result<DiffResult, AppError> {
        let mut inner = self.inner.lock().expect("service lock");
        let _ = self.compute_state(&mut inner);
        let repo = require_repo(&inner)?;
        let safe = pathguard::sanitize(path)?;
        Ok(match mode {
            DiffMode::Untracked => untracked_diff(&repo.root, &safe),
            DiffMode::Staged => tracked_diff(&repo.git, &safe, true),
            DiffMode::Unstaged => tracked_diff(&repo.git, &safe, false),
        })
    }

    fn dispatch(&self, inner: &mut ServiceInner, command: AppCommand) -> Result<(), AppError> {
        match command {
            AppCommand::OpenFolder { path } => {
                inner.selected_path = Some(PathBuf::from(&path));
                inner.repo = None;
                self.settings.record_recent(&path)?;
                Ok(())
            }
            AppCommand::InitializeProject => self.initialize_project(inner),
            AppCommand::StartWork { name } => self.start_work(inner, &name),
            AppCommand::ResumeWork => self.resume_work(inner),
            AppCommand::ResetMain => self.reset_main(inner),
            AppCommand::ForceMain => self.force_main(inner),
            AppCommand::Stage { paths } => {
                let repo = require_repo(inner)?;
                ensure_on_work(&repo.git)?;
                repo.git.add(&sanitize_paths(&paths)?)?;
                Ok(())
            }
            AppCommand::Unstage { paths } => {
                let repo = require_repo(inner)?;
                ensure_on_work(&repo.git)?;
                repo.git.unstage(&sanitize_paths(&paths)?)?;
                Ok(())
            }
            AppCommand::Discard { paths } => {
                let repo = require_repo(inner)?;
                ensure_on_work(&repo.git)?;
                repo.git.discard_paths(&sanitize_paths(&paths)?)?;
                Ok(())
            }
            AppCommand::DiscardAll => {
                let repo = require_repo(inner)?;
                ensure_on_work(&repo.git)?;
                repo.git.reset_hard()?;
                repo.git.clean_all()?;
                Ok(())
            }
            AppCommand::SaveHistory { message } => self.save_history(inner, message),
            AppCommand::CompleteWork => self.complete_work(inner),
            AppCommand::UpdateSettings { settings } => {
                self.settings
                    .update_identity(&settings.user_name, &settings.user_email)?;
                Ok(())
            }
            // State is recomputed after every command anyway.
            AppCommand::Refresh => Ok(()),
        }
    }

    /// Derive the current `WorkspaceState` from backend queries, from
    /// scratch. Never incrementally patched, so external changes cannot
    /// cause drift.
    fn compute_state(&self, inner: &mut ServiceInner) -> WorkspaceState {
        let settings = self.settings.get();

        if inner.selected_path.is_none() {
            match settings.recent_workspaces.first() {
                Some(recent) => inner.selected_path = Some(PathBuf::from(recent)),
                None => return WorkspaceState::Empty,
            }
        }
        let selected = inner.selected_path.clone().expect("selection set above");

        if !selected.exists() {
            inner.selected_path = None;
            inner.repo = None;
            inner.watcher.stop();
            return WorkspaceState::Empty;
        }

        if !git::git_available() {
            return WorkspaceState::GitMissing;
        }

        let candidate = GitRepository::new(&selected);
        if !candidate.is_repo() {
            inner.repo = None;
            inner.watcher.stop();
            return WorkspaceState::NeedsInit {
                path: selected.display().to_string(),
            };
        }

        let root = match candidate.top_level() {
            Ok(root) => root,
            Err(e) => {
                inner.watcher.stop();
                return backend_error(None, &e);
            }
        };
        let root_str = root.display().to_string();
        inner.selected_path = Some(root.clone());
        if settings.recent_workspaces.first().map(String::as_str) != Some(root_str.as_str()) {
            if let Err(e) = self.settings.record_recent(&root_str) {
                tracing::warn!(error = %e, "could not record recent workspace");
            }
        }
        inner.repo = Some(RepoContext {
            root: root.clone(),
            git: GitRepository::new(&root),
        });
        let repo = inner.repo.as_ref().expect("context set above");

        let branches = match repo.git.list_branches() {
            Ok(b) => b,
            Err(e) => {
                inner.watcher.stop();
                return backend_error(Some(root_str), &e);
            }
        };
        if !branches.iter().any(|b| b == MAIN_BRANCH) {
            inner.watcher.stop();
            return WorkspaceState::NoMain { path: root_str };
        }

        // Marker and identity writes are idempotent; a failure here is
        // re-attempted on the next recomputation.
        if let Err(e) = ensure_managed_mark(&repo.git) {
            tracing::warn!(error = %e, "could not write managed marker");
        }
        if let Err(e) = ensure_user_config(&repo.git, &settings) {
            tracing::warn!(error = %e, "could not mirror user identity");
        }

        let branch = match supported_branch(&repo.git) {
            Some(branch) => branch,
            None => {
                inner.watcher.stop();
                return WorkspaceState::Error {
                    path: Some(root_str),
                    message: MSG_UNSUPPORTED_BRANCH.to_string(),
                    action: Some(RemediationAction::ForceMain),
                };
            }
        };

        let mode = if work::is_work_branch(&branch) {
            WorkspaceMode::Work
        } else {
            WorkspaceMode::Main
        };
        let work_candidates = repo.git.work_branches().unwrap_or_default();
        let active = if mode == WorkspaceMode::Work {
            work_candidates
                .iter()
                .find(|w| w.branch == branch)
                .cloned()
                .or_else(|| {
                    work::work_name_from_branch(&branch).map(|name| WorkInfo {
                        branch: branch.clone(),
                        name: name.as_str().to_string(),
                        updated_at: None,
                    })
                })
        } else {
            None
        };

        let files = match repo.git.status_files() {
            Ok(f) => f,
            Err(e) => {
                inner.watcher.stop();
                return backend_error(Some(root_str), &e);
            }
        };
        let has_any = !files.is_empty();
        let changes = ChangeSummary::classify(files);
        let main_dirty = mode == WorkspaceMode::Main && has_any;
        let is_managed = repo.git.get_config(MANAGED_KEY).as_deref() == Some("true");

        let observers = Arc::clone(&self.observers);
        inner
            .watcher
            .start(&root, Arc::new(move || notify_all(&observers)));

        WorkspaceState::Ready {
            path: root_str,
            mode,
            is_managed,
            work: active,
            work_candidates,
            changes,
            main_dirty,
        }
    }

    fn initialize_project(&self, inner: &mut ServiceInner) -> Result<(), AppError> {
        let selected = inner
            .selected_path
            .clone()
            .ok_or(AppError::WorkspaceNotReady)?;
        let settings = self.settings.get();
        if !settings.has_identity() {
            return Err(AppError::SettingsRequired);
        }
        let git = GitRepository::new(&selected);
        git.init_main()?;
        git.set_config(MANAGED_KEY, "true")?;
        git.set_config(SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
        git.set_config("user.name", settings.user_name.as_deref().unwrap_or_default())?;
        git.set_config(
            "user.email",
            settings.user_email.as_deref().unwrap_or_default(),
        )?;
        ensure_template_files(&selected)?;
        git.add_all()?;
        git.commit(INITIAL_COMMIT_MESSAGE)?;
        Ok(())
    }

    fn start_work(&self, inner: &mut ServiceInner, name: &str) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        let work_name = WorkName::parse(name)?;
        if !repo.git.work_branches()?.is_empty() {
            return Err(AppError::WorkExists);
        }
        if repo.git.current_branch()? != MAIN_BRANCH {
            return Err(AppError::NotOnMain);
        }
        repo.git.checkout_new(&work_name.to_branch())?;
        Ok(())
    }

    /// Resuming always wins over incidental edits made in the review state:
    /// uncommitted changes on the permanent branch are discarded before
    /// switching. Deliberate product policy; do not change without sign-off.
    fn resume_work(&self, inner: &mut ServiceInner) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        let candidates = repo.git.work_branches()?;
        let latest = candidates.first().ok_or(AppError::WorkMissing)?;
        let current = repo.git.current_branch()?;
        if current == MAIN_BRANCH && repo.git.has_changes()? {
            repo.git.reset_hard()?;
            repo.git.clean_all()?;
        }
        repo.git.checkout(&latest.branch)?;
        Ok(())
    }

    fn reset_main(&self, inner: &mut ServiceInner) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        if repo.git.current_branch()? != MAIN_BRANCH {
            return Err(AppError::NotOnMain);
        }
        repo.git.reset_hard()?;
        repo.git.clean_all()?;
        Ok(())
    }

    /// The remediation path for the `Error` state: unconditional destructive
    /// recovery back to the permanent branch.
    fn force_main(&self, inner: &mut ServiceInner) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        repo.git.reset_hard()?;
        repo.git.clean_all()?;
        repo.git.checkout(MAIN_BRANCH)?;
        Ok(())
    }

    fn save_history(
        &self,
        inner: &mut ServiceInner,
        message: Option<String>,
    ) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        ensure_on_work(&repo.git)?;
        let settings = self.settings.get();
        if !settings.has_identity() {
            return Err(AppError::SettingsRequired);
        }
        let has_staged = repo.git.status_files()?.iter().any(|f| f.staged);
        if !has_staged {
            return Err(AppError::NothingToSave);
        }
        let message = message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(timestamp_message);
        repo.git.commit(&message)?;
        Ok(())
    }

    fn complete_work(&self, inner: &mut ServiceInner) -> Result<(), AppError> {
        let repo = require_repo(inner)?;
        let branch = ensure_on_work(&repo.git)?;
        let settings = self.settings.get();
        if !settings.has_identity() {
            return Err(AppError::SettingsRequired);
        }
        if repo.git.has_changes()? {
            repo.git.add_all()?;
            repo.git.commit(AUTO_SAVE_MESSAGE)?;
        }
        repo.git.checkout(MAIN_BRANCH)?;
        // A non-fast-forward here means divergent history the simplified
        // model never produces; surfaced as fatal, never retried.
        repo.git.merge_fast_forward(&branch)?;
        repo.git.delete_branch(&branch)?;
        Ok(())
    }
}

fn require_repo(inner: &ServiceInner) -> Result<&RepoContext, AppError> {
    inner.repo.as_ref().ok_or(AppError::WorkspaceNotReady)
}

fn ensure_on_work(git: &GitRepository) -> Result<String, AppError> {
    let current = git.current_branch()?;
    if work::is_work_branch(&current) {
        Ok(current)
    } else {
        Err(AppError::NotOnWork)
    }
}

fn sanitize_paths(paths: &[String]) -> Result<Vec<String>, AppError> {
    paths
        .iter()
        .map(|p| {
            pathguard::sanitize(p)
                .map(|safe| safe.to_string_lossy().into_owned())
                .map_err(AppError::from)
        })
        .collect()
}

fn ensure_managed_mark(git: &GitRepository) -> io::Result<()> {
    if git.get_config(MANAGED_KEY).as_deref() != Some("true") {
        git.set_config(MANAGED_KEY, "true")?;
    }
    if git.get_config(SCHEMA_VERSION_KEY).as_deref() != Some(SCHEMA_VERSION) {
        git.set_config(SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Mirror the app identity into the repository only where the repository has
/// none of its own. Never overwrites an existing repo-level identity.
fn ensure_user_config(git: &GitRepository, settings: &Settings) -> io::Result<()> {
    let name = git.get_config("user.name");
    let email = git.get_config("user.email");
    if name.is_some() && email.is_some() {
        return Ok(());
    }
    if !settings.has_identity() {
        return Ok(());
    }
    if name.is_none() {
        git.set_config("user.name", settings.user_name.as_deref().unwrap_or_default())?;
    }
    if email.is_none() {
        git.set_config(
            "user.email",
            settings.user_email.as_deref().unwrap_or_default(),
        )?;
    }
    Ok(())
}

/// Resolve the current branch to one the workflow supports. A branch that is
/// neither the permanent branch nor a work branch triggers a checkout back to
/// the permanent branch; if that fails the situation needs user-confirmed
/// destructive remediation, so the caller maps it to the `Error` state.
fn supported_branch(git: &GitRepository) -> Option<String> {
    if let Ok(branch) = git.current_branch() {
        if branch == MAIN_BRANCH || work::is_work_branch(&branch) {
            return Some(branch);
        }
    }
    match git.checkout(MAIN_BRANCH) {
        Ok(()) => Some(MAIN_BRANCH.to_string()),
        Err(_) => None,
    }
}

fn ensure_template_files(base: &Path) -> io::Result<()> {
    write_if_missing(&base.join(".gitignore"), GITIGNORE_TEMPLATE)?;
    write_if_missing(&base.join("AGENTS.md"), AGENTS_TEMPLATE)?;
    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> io::Result<()> {
    if !path.exists() {
        std::fs::write(path, content)?;
    }
    Ok(())
}

fn backend_error(path: Option<String>, e: &io::Error) -> WorkspaceState {
    WorkspaceState::Error {
        path,
        message: e.to_string(),
        action: None,
    }
}

fn timestamp_message() -> String {
    let format = time::macros::format_description!("[year]/[month]/[day] [hour]:[minute]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&format).unwrap_or_else(|_| "Snapshot".to_string())
}

fn untracked_diff(root: &Path, rel: &Path) -> DiffResult {
    let resolved = match pathguard::resolve_inside_root(root, rel) {
        Ok(p) => p,
        Err(_) => {
            return DiffResult::NotFound {
                message: MSG_FILE_NOT_FOUND.to_string(),
            }
        }
    };
    let bytes = match std::fs::read(&resolved) {
        Ok(b) => b,
        Err(_) => {
            return DiffResult::NotFound {
                message: MSG_FILE_NOT_FOUND.to_string(),
            }
        }
    };
    if bytes.contains(&0) {
        return DiffResult::Binary {
            message: MSG_BINARY.to_string(),
        };
    }
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.chars().count() > MAX_DIFF_CHARS {
        return DiffResult::TooLarge {
            message: MSG_TOO_LARGE.to_string(),
        };
    }
    DiffResult::Text { text }
}

fn tracked_diff(git: &GitRepository, rel: &Path, staged: bool) -> DiffResult {
    let path = rel.to_string_lossy();
    match git.is_binary_diff(&path, staged) {
        Ok(true) => {
            return DiffResult::Binary {
                message: MSG_BINARY.to_string(),
            }
        }
        Ok(false) => {}
        Err(_) => {
            return DiffResult::NotFound {
                message: MSG_DIFF_UNAVAILABLE.to_string(),
            }
        }
    }
    match git.diff(&path, staged) {
        Ok(text) if text.chars().count() > MAX_DIFF_CHARS => DiffResult::TooLarge {
            message: MSG_TOO_LARGE.to_string(),
        },
        Ok(text) if text.is_empty() => DiffResult::Text {
            text: MSG_NO_CHANGES.to_string(),
        },
        Ok(text) => DiffResult::Text { text },
        Err(_) => DiffResult::NotFound {
            message: MSG_DIFF_UNAVAILABLE.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DomainError;

    #[test]
    fn test_timestamp_message_shape() {
        let msg = timestamp_message();
        // YYYY/MM/DD HH:MM
        assert_eq!(msg.len(), 16, "unexpected timestamp message: {}", msg);
        assert_eq!(&msg[4..5], "/");
        assert_eq!(&msg[7..8], "/");
        assert_eq!(&msg[13..14], ":");
    }

    #[test]
    fn test_sanitize_paths_rejects_traversal_in_batch() {
        let paths = vec!["ok.txt".to_string(), "../escape".to_string()];
        match sanitize_paths(&paths) {
            Err(AppError::Domain(DomainError::InvalidPath)) => {}
            other => panic!("expected InvalidPath, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_diff_without_repo_context_is_not_ready() {
        let td = tempfile::tempdir().expect("tmpdir");
        let service = WorkspaceService::new(SettingsStore::at_path(td.path().join("s.json")));
        match service.diff("a.txt", DiffMode::Unstaged) {
            Err(AppError::WorkspaceNotReady) => {}
            other => panic!("expected WorkspaceNotReady, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_state_without_selection_or_recents() {
        let td = tempfile::tempdir().expect("tmpdir");
        let service = WorkspaceService::new(SettingsStore::at_path(td.path().join("s.json")));
        let state = service.app_state();
        assert_eq!(state.workspace, WorkspaceState::Empty);
    }
}
