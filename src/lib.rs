//! Simplified revision history for a single folder.
//!
//! The workflow is deliberately constrained: one permanent branch holds the
//! reviewed history, at most one work is in progress at a time, and every
//! mutation goes through a small command set with explicit preconditions.
//! `service::WorkspaceService` is the entry point; everything else supports
//! it.

pub mod cli;
pub mod errors;
pub mod git;
pub mod pathguard;
pub mod service;
pub mod settings;
pub mod state;
pub mod watcher;
pub mod work;

pub use errors::{ApiError, AppError, DomainError};
pub use service::WorkspaceService;
pub use settings::{Settings, SettingsStore};
pub use state::{AppCommand, AppState, DiffMode, DiffResult, WorkspaceState};
