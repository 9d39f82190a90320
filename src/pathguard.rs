//! Guards for UI-supplied relative paths.
//!
//! Two layers: a lexical check applied to every path that reaches a git
//! command, and a stricter root-resolution check used only when reading raw
//! file contents off disk.

use std::path::{Component, Path, PathBuf};

use crate::errors::DomainError;

/// Lexically normalize a relative path: drop `.` segments, fold `..` into the
/// preceding segment where possible.
///
/// Returns `None` when the path is absolute, empty after normalization, or
/// still begins with a parent traversal.
fn normalize_relative(path: &str) -> Option<PathBuf> {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for comp in Path::new(path).components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            Component::Normal(seg) => parts.push(seg.to_os_string()),
        }
    }
    if parts.is_empty() {
        return None;
    }
    let mut out = PathBuf::new();
    for p in parts {
        out.push(p);
    }
    Some(out)
}

/// Validate a UI-supplied path as repository-relative and traversal-free.
pub fn sanitize(path: &str) -> Result<PathBuf, DomainError> {
    if path.is_empty() {
        return Err(DomainError::InvalidPath);
    }
    normalize_relative(path).ok_or(DomainError::InvalidPath)
}

/// Resolve a sanitized path against the repository root and require the
/// result to be a strict descendant of the root.
///
/// Catches what the lexical check alone cannot (drive-letter and separator
/// tricks on other platforms); only used before raw reads of untracked files.
pub fn resolve_inside_root(root: &Path, rel: &Path) -> Result<PathBuf, DomainError> {
    let joined = root.join(rel);
    let mut resolved = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(DomainError::InvalidPath);
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    if resolved == root || !resolved.starts_with(root) {
        return Err(DomainError::InvalidPath);
    }
    Ok(resolved)
}
