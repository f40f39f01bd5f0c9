//! Git queries and base-branch resolution

// Submodules
mod diff;
mod error;
pub mod parse;
mod repository;
mod resolve;

// Re-exports from submodules
pub use diff::{DiffReport, DiffStats};
pub use error::{GitError, NameKind};
pub use repository::Repository;
pub use resolve::{
    BranchResolver, Evidence, Strategy, resolve_base_branch, resolve_current_branch,
};

/// The branch another branch was created from, qualified by its remote.
///
/// Both fields are non-empty: a resolution either produces a complete value or
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BaseBranch {
    pub remote: String,
    pub branch: String,
}

impl BaseBranch {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    /// Re-check both names before the value is echoed or reused in git commands.
    pub fn validate(self) -> Result<Self, GitError> {
        crate::validate::validate_remote_name(&self.remote)?;
        crate::validate::validate_branch_name(&self.branch)?;
        Ok(self)
    }
}

impl std::fmt::Display for BaseBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// A branch considered by merge-base analysis.
///
/// `remote` is `None` for local branches. The optional fields are filled in as
/// the candidate is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCandidate {
    pub name: String,
    pub remote: Option<String>,
    pub merge_base_commit: Option<String>,
    /// Commits on the resolving branch that this candidate lacks.
    pub ahead_count: Option<usize>,
}

impl BranchCandidate {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: None,
            merge_base_commit: None,
            ahead_count: None,
        }
    }

    pub fn remote(remote: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            remote: Some(remote.into()),
            ..Self::local(name)
        }
    }

    /// Fully qualified ref, unambiguous even when a tag shares the name.
    pub fn ref_name(&self) -> String {
        match &self.remote {
            Some(remote) => format!("refs/remotes/{remote}/{}", self.name),
            None => format!("refs/heads/{}", self.name),
        }
    }
}

impl std::fmt::Display for BranchCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.remote {
            Some(remote) => write!(f, "{remote}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
