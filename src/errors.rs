//! Error mapping guide:
//! - Domain errors are user-correctable input problems (bad work name, bad path).
//! - Application errors are workflow/precondition violations.
//! - Both carry a stable code; unexpected git failures collapse into `unknown`
//!   while preserving the underlying message.

use serde::Serialize;
use thiserror::Error;

/// User-correctable input problems.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Enter a name for the work.")]
    WorkNameEmpty,
    #[error("Work names may only use letters, digits, and hyphens.")]
    WorkNameInvalid,
    #[error("That work name is reserved and cannot be used.")]
    WorkNameReserved,
    #[error("Invalid file path.")]
    InvalidPath,
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::WorkNameEmpty => "work-name-empty",
            DomainError::WorkNameInvalid => "work-name-invalid",
            DomainError::WorkNameReserved => "work-name-reserved",
            DomainError::InvalidPath => "invalid-path",
        }
    }
}

/// Workflow and precondition violations surfaced at the command boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Open a folder first.")]
    WorkspaceNotReady,
    #[error("Set the name and email to record in history.")]
    SettingsRequired,
    #[error("This action is only available in the review state.")]
    NotOnMain,
    #[error("This action is only available while a work is active.")]
    NotOnWork,
    #[error("A work is already in progress. Resume it instead.")]
    WorkExists,
    #[error("No unfinished work was found.")]
    WorkMissing,
    #[error("There are no changes to include.")]
    NothingToSave,
    #[error("Too many changes to display.")]
    DiffTooLarge,
    #[error("Invalid file path.")]
    InvalidPath,
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Unexpected backend failure; message comes from git stderr.
    #[error("{0}")]
    Backend(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::WorkspaceNotReady => "workspace-not-ready",
            AppError::SettingsRequired => "settings-required",
            AppError::NotOnMain => "not-on-main",
            AppError::NotOnWork => "not-on-work",
            AppError::WorkExists => "work-exists",
            AppError::WorkMissing => "work-missing",
            AppError::NothingToSave => "nothing-to-save",
            AppError::DiffTooLarge => "diff-too-large",
            AppError::InvalidPath => "invalid-path",
            AppError::Domain(e) => e.code(),
            AppError::Backend(_) => "unknown",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Backend(e.to_string())
    }
}

/// Wire form of an error for the UI boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ApiError {
    fn from(e: &AppError) -> Self {
        ApiError {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}
