use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;

use super::parse::{
    ReflogEntry, parse_config_value, parse_current_branch, parse_left_right_count,
    parse_object_name, parse_ref_list, parse_reflog_oldest_first, parse_remote_list,
};
use super::{DiffStats, GitError};
use crate::shell_exec::{self, CommandResult, DEFAULT_TIMEOUT};

/// Repository context for git operations.
///
/// Read-only: nothing here writes refs, config or the working tree. Results are
/// never cached, so two calls always reflect the repository as it is on disk.
///
/// # Examples
///
/// ```no_run
/// use branchwise::git::Repository;
///
/// let repo = Repository::at("/path/to/repo");
/// let branch = repo.current_branch()?;
/// let (ahead, behind) = repo.ahead_behind("refs/heads/main", "refs/heads/feature")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    timeout: Duration,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Like [`Repository::at`], but fail early when `path` is not a directory.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(GitError::NotADirectory { path }.into());
        }
        Ok(Self::at(path))
    }

    /// Per-invocation deadline for every git command run through this context.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the path this repository was created with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the current branch name, or None if in detached HEAD state.
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        let stdout = self.run_command(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(parse_current_branch(&stdout))
    }

    /// Get the current branch name, or error if in detached HEAD state.
    ///
    /// `action` describes what requires being on a branch (e.g., "compute a diff").
    pub fn require_current_branch(&self, action: &str) -> anyhow::Result<String> {
        self.current_branch()?.ok_or_else(|| {
            GitError::DetachedHead {
                action: Some(action.into()),
            }
            .into()
        })
    }

    /// Reflog subjects for `reference` (a full ref or `HEAD`), oldest first.
    ///
    /// A ref without a reflog yields an empty list rather than an error.
    pub fn reflog(&self, reference: &str) -> anyhow::Result<Vec<ReflogEntry>> {
        // `--reverse` can't be combined with walking reflogs, so reorder here.
        let result = self.run(&["reflog", "show", "--format=%gs", reference, "--"]);
        if result.timed_out {
            return Err(self.timeout_error(&["reflog", "show", reference]));
        }
        if !result.success() {
            log::debug!("  ! no reflog for {reference}");
            return Ok(Vec::new());
        }
        Ok(parse_reflog_oldest_first(&result.output))
    }

    /// Get a git config value. Returns None if the key doesn't exist.
    pub fn get_config(&self, key: &str) -> anyhow::Result<Option<String>> {
        let args = ["config", "--get", key];
        let result = self.run(&args);
        match result.exit_code {
            0 => Ok(parse_config_value(&result.output)),
            // Exit code 1 means the key is not set
            1 if !result.timed_out => Ok(None),
            _ => Err(self.command_error(&args, result)),
        }
    }

    /// Configured remote names, in `git remote` order.
    pub fn remotes(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["remote"])?;
        Ok(parse_remote_list(&stdout))
    }

    /// Local branch names in `for-each-ref` order.
    pub fn local_branches(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["for-each-ref", "--format=%(refname)", "refs/heads/"])?;
        Ok(parse_ref_list(&stdout, "refs/heads/"))
    }

    /// Branch names under `refs/remotes/<remote>/`, excluding the `HEAD` symref.
    pub fn remote_branches(&self, remote: &str) -> anyhow::Result<Vec<String>> {
        let prefix = format!("refs/remotes/{remote}/");
        let stdout = self.run_command(&["for-each-ref", "--format=%(refname)", &prefix])?;
        Ok(parse_ref_list(&stdout, &prefix))
    }

    /// Check whether a fully qualified ref exists.
    pub fn ref_exists(&self, full_ref: &str) -> anyhow::Result<bool> {
        self.run_command_check(&["show-ref", "--verify", "--quiet", full_ref])
    }

    /// Resolve a revision to the commit it points at.
    pub fn rev_parse(&self, rev: &str) -> anyhow::Result<String> {
        let commit = format!("{rev}^{{commit}}");
        let stdout = self.run_command(&["rev-parse", "--verify", "--quiet", &commit])?;
        parse_object_name(&stdout).ok_or_else(|| {
            GitError::ParseError {
                message: format!("rev-parse printed no object name for {rev}"),
            }
            .into()
        })
    }

    /// Get the merge base between two commits.
    ///
    /// Returns `None` when the histories share no commit.
    pub fn merge_base(&self, commit1: &str, commit2: &str) -> anyhow::Result<Option<String>> {
        let args = ["merge-base", commit1, commit2];
        let result = self.run(&args);
        match result.exit_code {
            0 => Ok(parse_object_name(&result.output)),
            1 if !result.timed_out && result.output.trim().is_empty() => Ok(None),
            _ => Err(self.command_error(&args, result)),
        }
    }

    /// Count commits unique to each side of `base...head`.
    ///
    /// Returns (ahead, behind) where ahead is commits in head not in base,
    /// and behind is commits in base not in head.
    pub fn ahead_behind(&self, base: &str, head: &str) -> anyhow::Result<(usize, usize)> {
        let range = format!("{base}...{head}");
        let output = self.run_command(&["rev-list", "--left-right", "--count", &range, "--"])?;

        // git rev-list --left-right outputs left (base) first, then right (head)
        let (behind, ahead) = parse_left_right_count(&output)?;
        Ok((ahead, behind))
    }

    /// True when `head` has commits `base` lacks and `base` has none that `head` lacks.
    pub fn is_strictly_ahead(&self, head: &str, base: &str) -> anyhow::Result<bool> {
        let (ahead, behind) = self.ahead_behind(base, head)?;
        Ok(ahead > 0 && behind == 0)
    }

    /// Diff statistics for the changes `head` introduces since it forked from `base`.
    pub fn diff_shortstat(&self, base: &str, head: &str) -> anyhow::Result<DiffStats> {
        let range = format!("{base}...{head}");
        let stdout = self.run_command(&["diff", "--shortstat", &range, "--"])?;
        Ok(DiffStats::from_shortstat(&stdout))
    }

    /// Get a short display name for this repository, used in logging context.
    ///
    /// Returns "." for the current directory, or the directory name otherwise.
    fn logging_context(&self) -> String {
        if self.path.to_str() == Some(".") {
            ".".to_string()
        } else {
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?")
                .to_string()
        }
    }

    /// Run git in this repository and return the raw result.
    pub fn run(&self, args: &[&str]) -> CommandResult {
        shell_exec::run(
            "git",
            args,
            &self.path,
            self.timeout,
            Some(&self.logging_context()),
        )
    }

    /// Run a git command in this repository's context.
    ///
    /// Returns the combined output on success. A non-zero exit becomes
    /// [`GitError::CommandFailed`], a timeout [`GitError::CommandTimeout`].
    ///
    /// # Examples
    /// ```no_run
    /// use branchwise::git::Repository;
    ///
    /// let repo = Repository::at(".");
    /// let remotes = repo.run_command(&["remote"])?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn run_command(&self, args: &[&str]) -> anyhow::Result<String> {
        let result = self.run(args);
        if !result.success() {
            return Err(self.command_error(args, result));
        }
        Ok(result.output)
    }

    /// Run a git command and return whether it succeeded (exit code 0).
    ///
    /// This is useful for commands that use exit codes for boolean results,
    /// like `git show-ref --verify --quiet`. Only a timeout or a failure to
    /// start is an error.
    pub fn run_command_check(&self, args: &[&str]) -> anyhow::Result<bool> {
        let result = self.run(args);
        if result.timed_out {
            return Err(self.timeout_error(args));
        }
        if result.exit_code == shell_exec::SENTINEL_EXIT_CODE {
            bail!("{}", result.output.trim());
        }
        Ok(result.success())
    }

    fn command_error(&self, args: &[&str], result: CommandResult) -> anyhow::Error {
        if result.timed_out {
            return self.timeout_error(args);
        }
        for line in result.non_empty_lines() {
            log::debug!("  ! {}", line);
        }
        GitError::CommandFailed {
            command: command_line(args),
            exit_code: result.exit_code,
            output: result.output,
        }
        .into()
    }

    fn timeout_error(&self, args: &[&str]) -> anyhow::Error {
        GitError::CommandTimeout {
            command: command_line(args),
            timeout: self.timeout,
        }
        .into()
    }
}

fn command_line(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}
