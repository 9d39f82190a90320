//! Work identifiers and their branch mapping.
//!
//! A work lives on a branch named `work-<identifier>`. Identifiers are only
//! constructible through validation, so every `WorkName` in the program is
//! known to be branch-safe.

use serde::Serialize;

use crate::errors::DomainError;

/// The single long-lived branch holding the reviewable state of the project.
pub const MAIN_BRANCH: &str = "main";

/// Prefix for short-lived work branches.
pub const WORK_BRANCH_PREFIX: &str = "work-";

/// Names that would collide with branch conventions if used as identifiers.
const RESERVED_NAMES: [&str; 3] = ["main", "master", "work"];

/// A validated work identifier. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WorkName(String);

impl WorkName {
    /// Trim and validate a user-supplied name.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::WorkNameEmpty);
        }
        if !is_valid_format(trimmed) {
            return Err(DomainError::WorkNameInvalid);
        }
        if RESERVED_NAMES.contains(&trimmed) {
            return Err(DomainError::WorkNameReserved);
        }
        Ok(WorkName(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Branch name carrying this work: `work-<name>`.
    pub fn to_branch(&self) -> String {
        format!("{}{}", WORK_BRANCH_PREFIX, self.0)
    }
}

impl std::fmt::Display for WorkName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_format(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Does this branch name carry the recognized work prefix?
pub fn is_work_branch(branch: &str) -> bool {
    branch.starts_with(WORK_BRANCH_PREFIX)
}

/// Reverse mapping from a branch name to a work identifier.
///
/// Returns `None` unless the branch carries the work prefix and the remainder
/// independently passes validation. A manually created branch like `work-` or
/// `work-main` is not a valid work.
pub fn work_name_from_branch(branch: &str) -> Option<WorkName> {
    let rest = branch.strip_prefix(WORK_BRANCH_PREFIX)?;
    if rest.is_empty() || !is_valid_format(rest) || RESERVED_NAMES.contains(&rest) {
        return None;
    }
    Some(WorkName(rest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_accepts_valid_names() {
        let name = WorkName::parse("  fix-1  ").expect("valid name");
        assert_eq!(name.as_str(), "fix-1");
        assert_eq!(name.to_branch(), "work-fix-1");
    }

    #[test]
    fn test_parse_rejects_empty_after_trim() {
        for raw in ["", "   ", "\t\n"] {
            match WorkName::parse(raw) {
                Err(DomainError::WorkNameEmpty) => {}
                other => panic!("expected WorkNameEmpty for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        for raw in ["fix 1", "fix_1", "日本語", "a/b", "a.b"] {
            match WorkName::parse(raw) {
                Err(DomainError::WorkNameInvalid) => {}
                other => panic!("expected WorkNameInvalid for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_parse_rejects_reserved_names() {
        for raw in ["main", "master", "work"] {
            match WorkName::parse(raw) {
                Err(DomainError::WorkNameReserved) => {}
                other => panic!("expected WorkNameReserved for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_branch_round_trip() {
        for raw in ["fix-1", "ABC", "2024-04-01", "a"] {
            let name = WorkName::parse(raw).expect("valid name");
            let back = work_name_from_branch(&name.to_branch()).expect("round trip");
            assert_eq!(back, name);
        }
    }

    #[test]
    fn test_work_name_from_branch_guards_manual_branches() {
        assert!(work_name_from_branch("work-").is_none());
        assert!(work_name_from_branch("work-main").is_none());
        assert!(work_name_from_branch("work-master").is_none());
        assert!(work_name_from_branch("work-work").is_none());
        assert!(work_name_from_branch("work-has space").is_none());
        assert!(work_name_from_branch("feature-x").is_none());
        assert!(work_name_from_branch("main").is_none());
    }

    #[test]
    fn test_is_work_branch() {
        assert!(is_work_branch("work-fix-1"));
        assert!(is_work_branch("work-"));
        assert!(!is_work_branch("main"));
        assert!(!is_work_branch("feature/work-x"));
    }
}
