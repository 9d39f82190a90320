//! Narrow facade over the `git` binary, bound to one repository root.
//!
//! Only the constrained command set the state machine needs is exposed here.
//! Helpers return `io::Result`; failed invocations surface git's stderr so
//! the service layer can wrap it with a stable error code.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use once_cell::sync::OnceCell;
use which::which;

use crate::state::{ChangeFile, WorkInfo};
use crate::work::{self, WORK_BRANCH_PREFIX};

/// Unified diff text above this many characters is refused for display.
pub const MAX_DIFF_CHARS: usize = 1_000_000;

static GIT_AVAILABLE: OnceCell<bool> = OnceCell::new();

/// Is the git tooling present on this host? Probed once, cached for the
/// process lifetime.
pub fn git_available() -> bool {
    *GIT_AVAILABLE.get_or_init(|| {
        if which("git").is_err() {
            return false;
        }
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Stateless gateway bound to a repository root at construction.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run git with -C <root>, capturing output.
    fn git(&self, args: &[&str]) -> io::Result<Output> {
        tracing::debug!(root = %self.root.display(), ?args, "git");
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.root);
        for a in args {
            cmd.arg(a);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.output()
    }

    /// Run git and require success; error text comes from stderr.
    fn git_ok(&self, args: &[&str]) -> io::Result<()> {
        let out = self.git(args)?;
        if out.status.success() {
            Ok(())
        } else {
            Err(failure(args, &out))
        }
    }

    /// Run git and capture trimmed stdout on success.
    fn git_stdout(&self, args: &[&str]) -> io::Result<String> {
        let out = self.git(args)?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
        } else {
            Err(failure(args, &out))
        }
    }

    /// Is this path inside a git working tree?
    pub fn is_repo(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
            .unwrap_or(false)
    }

    /// Canonical top-level root of the working tree.
    pub fn top_level(&self) -> io::Result<PathBuf> {
        self.git_stdout(&["rev-parse", "--show-toplevel"])
            .map(PathBuf::from)
    }

    /// Name of the branch HEAD points at. Works on an unborn branch; fails
    /// on a detached HEAD, which the caller treats as unsupported.
    pub fn current_branch(&self) -> io::Result<String> {
        self.git_stdout(&["symbolic-ref", "--short", "HEAD"])
    }

    /// All local branch names.
    pub fn list_branches(&self) -> io::Result<Vec<String>> {
        let out = self.git_stdout(&["branch", "--list", "--format=%(refname:short)"])?;
        Ok(out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Enumerate work branches, most recently committed first.
    pub fn work_branches(&self) -> io::Result<Vec<WorkInfo>> {
        let pattern = format!("refs/heads/{}*", WORK_BRANCH_PREFIX);
        let out = self.git_stdout(&[
            "for-each-ref",
            "--sort=-committerdate",
            "--format=%(refname:short)\t%(committerdate:iso8601)",
            &pattern,
        ])?;
        Ok(out
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let (branch, date) = line.split_once('\t')?;
                let name = work::work_name_from_branch(branch)?;
                Some(WorkInfo {
                    branch: branch.to_string(),
                    name: name.as_str().to_string(),
                    updated_at: Some(date.to_string()),
                })
            })
            .collect())
    }

    /// Status listing with per-file facets, in git's own order.
    pub fn status_files(&self) -> io::Result<Vec<ChangeFile>> {
        let out = self.git(&["status", "--porcelain=v1", "-uall"])?;
        if !out.status.success() {
            return Err(failure(&["status"], &out));
        }
        Ok(parse_porcelain(&String::from_utf8_lossy(&out.stdout)))
    }

    pub fn has_changes(&self) -> io::Result<bool> {
        Ok(!self.status_files()?.is_empty())
    }

    pub fn checkout(&self, branch: &str) -> io::Result<()> {
        self.git_ok(&["checkout", branch])
    }

    pub fn checkout_new(&self, branch: &str) -> io::Result<()> {
        self.git_ok(&["checkout", "-b", branch])
    }

    pub fn add(&self, paths: &[String]) -> io::Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git_ok(&args)
    }

    pub fn add_all(&self) -> io::Result<()> {
        self.git_ok(&["add", "-A"])
    }

    pub fn unstage(&self, paths: &[String]) -> io::Result<()> {
        let mut args = vec!["reset", "HEAD", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git_ok(&args)
    }

    /// Discard specific paths, splitting tracked (checkout from index) from
    /// untracked (clean). The split consults live status immediately before
    /// acting; a change slipping in between is an accepted non-atomic
    /// boundary for a single-user local tool.
    pub fn discard_paths(&self, paths: &[String]) -> io::Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let untracked_set: std::collections::HashSet<String> = self
            .status_files()?
            .into_iter()
            .filter(|f| f.untracked)
            .map(|f| f.path)
            .collect();
        let (untracked, tracked): (Vec<&String>, Vec<&String>) =
            paths.iter().partition(|p| untracked_set.contains(*p));
        if !tracked.is_empty() {
            let mut args = vec!["checkout", "--"];
            args.extend(tracked.iter().map(|s| s.as_str()));
            self.git_ok(&args)?;
        }
        if !untracked.is_empty() {
            let mut args = vec!["clean", "-f", "--"];
            args.extend(untracked.iter().map(|s| s.as_str()));
            self.git_ok(&args)?;
        }
        Ok(())
    }

    pub fn reset_hard(&self) -> io::Result<()> {
        self.git_ok(&["reset", "--hard"])
    }

    pub fn clean_all(&self) -> io::Result<()> {
        self.git_ok(&["clean", "-fd"])
    }

    pub fn commit(&self, message: &str) -> io::Result<()> {
        self.git_ok(&["commit", "-m", message])
    }

    /// Merge permitted only when fast-forward. A non-ff failure is fatal for
    /// the simplified model; it is surfaced, never retried.
    pub fn merge_fast_forward(&self, branch: &str) -> io::Result<()> {
        self.git_ok(&["merge", "--ff-only", branch])
    }

    pub fn delete_branch(&self, branch: &str) -> io::Result<()> {
        self.git_ok(&["branch", "-D", branch])
    }

    /// Initialize a fresh repository with the permanent branch as default.
    pub fn init_main(&self) -> io::Result<()> {
        self.git_ok(&["init", "-b", work::MAIN_BRANCH])
    }

    /// Read a repository-local config value; absent keys yield None.
    pub fn get_config(&self, key: &str) -> Option<String> {
        self.git(&["config", "--local", "--get", key])
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn set_config(&self, key: &str, value: &str) -> io::Result<()> {
        self.git_ok(&["config", "--local", key, value])
    }

    /// Unified diff for one path in staged or unstaged mode.
    pub fn diff(&self, path: &str, staged: bool) -> io::Result<String> {
        let args: Vec<&str> = if staged {
            vec!["diff", "--cached", "--", path]
        } else {
            vec!["diff", "--", path]
        };
        let out = self.git(&args)?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).to_string())
        } else {
            Err(failure(&args, &out))
        }
    }

    /// Does the numeric diff-stat carry git's binary no-stat marker?
    pub fn is_binary_diff(&self, path: &str, staged: bool) -> io::Result<bool> {
        let args: Vec<&str> = if staged {
            vec!["diff", "--cached", "--numstat", "--", path]
        } else {
            vec!["diff", "--numstat", "--", path]
        };
        let out = self.git(&args)?;
        if !out.status.success() {
            return Err(failure(&args, &out));
        }
        Ok(numstat_has_binary_marker(&String::from_utf8_lossy(
            &out.stdout,
        )))
    }
}

fn failure(args: &[&str], out: &Output) -> io::Error {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let msg = stderr.trim();
    if msg.is_empty() {
        io::Error::other(format!("git {} failed", args.join(" ")))
    } else {
        io::Error::other(msg.to_string())
    }
}

/// Parse `status --porcelain=v1` output into per-file facets.
///
/// Column semantics: `U` in either column marks a conflict, `?` marks an
/// untracked file, any other non-space index/worktree column means staged or
/// unstaged respectively. Rename lines carry `from -> to`.
pub fn parse_porcelain(output: &str) -> Vec<ChangeFile> {
    output
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let bytes = line.as_bytes();
            let index = bytes[0] as char;
            let worktree = bytes[1] as char;
            let rest = &line[3..];
            let (renamed_from, path) = match rest.split_once(" -> ") {
                Some((from, to)) => (Some(unquote(from)), unquote(to)),
                None => (None, unquote(rest)),
            };
            let conflicted = index == 'U' || worktree == 'U';
            let untracked = index == '?' || worktree == '?';
            Some(ChangeFile {
                path,
                staged: index != ' ' && index != '?' && !conflicted,
                unstaged: worktree != ' ' && worktree != '?' && !conflicted,
                untracked,
                conflicted,
                renamed_from,
            })
        })
        .collect()
}

// Git C-quotes paths with special characters. Besides the simple escapes,
// non-ASCII bytes arrive octal-escaped (\346\227\245...) under the default
// core.quotepath setting, so decoding has to go through raw bytes.
fn unquote(raw: &str) -> String {
    let raw = raw.trim_end();
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return raw.to_string();
    }
    let inner = raw[1..raw.len() - 1].as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] != b'\\' || i + 1 == inner.len() {
            out.push(inner[i]);
            i += 1;
            continue;
        }
        i += 1;
        match inner[i] {
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b'0'..=b'7' => {
                // Up to three octal digits per byte.
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 && i < inner.len() && (b'0'..=b'7').contains(&inner[i]) {
                    value = value * 8 + u32::from(inner[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push(value as u8);
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The `-\t-\t` line git emits in --numstat for binary content.
pub fn numstat_has_binary_marker(output: &str) -> bool {
    output.lines().any(|line| line.starts_with("-\t-\t"))
}
