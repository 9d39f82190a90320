use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::state::DiffMode;

/// Folder history for non-technical users: one permanent branch, one work at
/// a time.
#[derive(Parser, Debug)]
#[command(name = "kaihistory", version, about)]
pub struct Cli {
    /// Use an alternate settings file instead of the per-user default
    #[arg(long = "settings-file", global = true, value_name = "PATH")]
    pub settings_file: Option<PathBuf>,

    /// Enable debug-level diagnostics on stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Print the current application state as JSON
    State,
    /// Open a folder and print the resulting state
    Open {
        /// Folder to open
        path: String,
    },
    /// Turn the open folder into a managed project with an initial history
    Init,
    /// Start a new work with the given name
    Start {
        /// Work name (letters, digits, and hyphens)
        name: String,
    },
    /// Resume the most recent unfinished work
    Resume,
    /// Save the staged changes into history
    Save {
        /// Message for the entry; defaults to a timestamp
        #[arg(short = 'm', long = "message")]
        message: Option<String>,
    },
    /// Complete the current work and fold it into the permanent history
    Complete,
    /// Discard every change while in the review state
    ResetMain,
    /// Return to the review state unconditionally, discarding everything
    ForceMain,
    /// Stage files for the next save
    Stage {
        /// Paths relative to the workspace root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Unstage files
    Unstage {
        /// Paths relative to the workspace root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Discard changes to specific files
    Discard {
        /// Paths relative to the workspace root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Discard every change in the working tree
    DiscardAll,
    /// Show the saved user identity, or update it when both flags are given
    Settings {
        /// Name to record in history
        #[arg(long, requires = "email")]
        name: Option<String>,
        /// Email to record in history
        #[arg(long, requires = "name")]
        email: Option<String>,
    },
    /// Print the classified diff for one file
    Diff {
        /// Path relative to the workspace root
        path: String,
        /// Which side of the change to show
        #[arg(long, value_enum, default_value = "unstaged")]
        mode: DiffMode,
    },
    /// Open a folder and print a state snapshot on every filesystem change
    Watch {
        /// Folder to open
        path: String,
    },
    /// Recompute and print the state
    Refresh,
}
