//! Diff statistics between two revisions.

use super::{BranchResolver, GitError};
use crate::styling::{ADDITION, DELETION};
use crate::validate::{validate_branch_name, validate_remote_name};

/// Totals parsed from `git diff --shortstat`.
///
/// Git omits the insertion or deletion clause when its count is zero, and
/// prints nothing at all for an empty diff, so every field defaults to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct DiffStats {
    pub files: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffStats {
    /// Construct stats from `git diff --shortstat` output.
    pub fn from_shortstat(output: &str) -> Self {
        let mut stats = DiffStats::default();

        // Example: " 3 files changed, 45 insertions(+), 12 deletions(-)"
        let Some(line) = output.lines().find(|line| line.contains("changed")) else {
            return stats;
        };

        for part in line.split(',') {
            let part = part.trim();
            let Some(count) = part
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<usize>().ok())
            else {
                continue;
            };

            if part.contains("file") {
                stats.files = count;
            } else if part.contains("insertion") {
                stats.insertions = count;
            } else if part.contains("deletion") {
                stats.deletions = count;
            }
        }

        stats
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0
    }

    /// Format stats as a summary string (e.g., "3 files, +45, -12")
    pub fn format_summary(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }

        let files = self.files;
        let insertions = self.insertions;
        let deletions = self.deletions;
        format!(
            "{files} file{}, {ADDITION}+{insertions}{ADDITION:#}, {DELETION}-{deletions}{DELETION:#}",
            if files == 1 { "" } else { "s" }
        )
    }
}

/// Changes `head` introduces relative to `base`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DiffReport {
    pub base: String,
    pub head: String,
    #[serde(flatten)]
    pub stats: DiffStats,
}

impl std::fmt::Display for DiffReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}...{}: {}",
            self.base,
            self.head,
            self.stats.format_summary()
        )
    }
}

impl BranchResolver {
    /// Diff stats for `head` (default: the checked-out branch) against `base`
    /// (default: its resolved base branch).
    ///
    /// Unlike base-branch resolution this is a user-facing operation, so a
    /// detached HEAD or an unresolved base is an error rather than `None`.
    pub fn diff_stat(
        &self,
        base: Option<&str>,
        head: Option<&str>,
        remote: &str,
    ) -> anyhow::Result<DiffReport> {
        let repo = self.repository();

        let head = match head {
            Some(head) => validate_branch_name(head)?.to_string(),
            None => repo.require_current_branch("compute a diff stat")?,
        };
        let base = match base {
            Some(base) => validate_branch_name(base)?.to_string(),
            None => {
                validate_remote_name(remote)?;
                let resolved = self
                    .base_branch(&head, remote)
                    .ok_or_else(|| GitError::BaseBranchUnresolved {
                        branch: head.clone(),
                    })?
                    .validate()?;
                // Remote-tracking ref when present, else the local branch.
                let tracking = format!("refs/remotes/{resolved}");
                if repo.ref_exists(&tracking)? {
                    resolved.to_string()
                } else {
                    resolved.branch
                }
            }
        };

        let stats = repo.diff_shortstat(&base, &head)?;
        Ok(DiffReport { base, head, stats })
    }
}
