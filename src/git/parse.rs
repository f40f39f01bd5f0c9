//! Git output parsing functions
//!
//! Pure functions over git's textual output. Executor output interleaves
//! stdout and stderr, so every parser accepts only lines of the exact shape it
//! expects and ignores anything else (warnings, hints).

use std::sync::LazyLock;

use regex::Regex;

use super::GitError;
use crate::validate::is_valid_branch_name;

/// `branch: Created from <source>` (first entry of a branch's reflog)
static CREATED_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^branch: Created from (?P<source>\S+)$").unwrap());

/// `checkout: moving from <from> to <to>`
static CHECKOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^checkout: moving from (?P<from>\S+) to (?P<to>\S+)$").unwrap()
});

/// Abbreviated or full SHA-1, as a user may type it. Git resolves hex names
/// case-insensitively, so upper case counts too.
static COMMIT_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").unwrap());

/// Full object name as printed by `merge-base`/`rev-parse` (SHA-1 or SHA-256).
/// Git always prints these in lower case.
static OBJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9a-f]{40}|[0-9a-f]{64})$").unwrap());

/// `<left>\t<right>` from `rev-list --left-right --count`.
static LEFT_RIGHT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<left>\d+)\s+(?P<right>\d+)$").unwrap());

/// One reflog subject line, parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub raw_line: String,
}

impl ReflogEntry {
    pub fn new(raw_line: impl Into<String>) -> Self {
        Self {
            raw_line: raw_line.into(),
        }
    }

    /// Source of a `branch: Created from X` record.
    pub fn created_from(&self) -> Option<&str> {
        CREATED_FROM
            .captures(self.raw_line.trim())
            .and_then(|caps| caps.name("source"))
            .map(|m| m.as_str())
    }

    /// Source of a `checkout: moving from X to <branch>` record.
    pub fn checked_out_from(&self, branch: &str) -> Option<&str> {
        let caps = CHECKOUT.captures(self.raw_line.trim())?;
        if caps.name("to")?.as_str() != branch {
            return None;
        }
        caps.name("from").map(|m| m.as_str())
    }
}

/// Parse `git reflog show --format=%gs` output (newest first) into entries,
/// oldest first.
pub fn parse_reflog_oldest_first(output: &str) -> Vec<ReflogEntry> {
    let mut entries: Vec<_> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ReflogEntry::new)
        .collect();
    entries.reverse();
    entries
}

/// True for 7–40 hex digit strings, i.e. anything that reads as a commit id.
pub fn looks_like_commit_hash(name: &str) -> bool {
    COMMIT_HASH.is_match(name)
}

/// A reflog source that names a branch, split into optional remote and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBranch {
    pub remote: Option<String>,
    pub branch: String,
}

/// Interpret a reflog source (`X` in `Created from X`) as a branch.
///
/// `remotes` are the configured remote names; a leading `<remote>/` is
/// stripped only when it names one of them, so `feature/x` stays intact.
/// Returns `None` for `HEAD`, commit ids, and anything that isn't a valid
/// branch name (`main~2`, `@{-1}`).
pub fn parse_reflog_source(source: &str, remotes: &[String]) -> Option<SourceBranch> {
    let source = source.trim();
    if source.is_empty() || source == "HEAD" || looks_like_commit_hash(source) {
        return None;
    }

    let (remote, branch) = if let Some(local) = source.strip_prefix("refs/heads/") {
        (None, local)
    } else if let Some(remote_ref) = source.strip_prefix("refs/remotes/") {
        split_remote_prefix(remote_ref, remotes)
            .map(|(remote, branch)| (Some(remote), branch))
            .unwrap_or((None, remote_ref))
    } else {
        split_remote_prefix(source, remotes)
            .map(|(remote, branch)| (Some(remote), branch))
            .unwrap_or((None, source))
    };

    if branch == "HEAD" || looks_like_commit_hash(branch) || !is_valid_branch_name(branch) {
        return None;
    }

    Some(SourceBranch {
        remote: remote.map(str::to_string),
        branch: branch.to_string(),
    })
}

/// Split `<remote>/<branch>` using the longest matching configured remote.
fn split_remote_prefix<'a>(name: &'a str, remotes: &'a [String]) -> Option<(&'a str, &'a str)> {
    remotes
        .iter()
        .filter_map(|remote| {
            name.strip_prefix(remote.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty())
                .map(|rest| (remote.as_str(), rest))
        })
        .max_by_key(|(remote, _)| remote.len())
}

/// Parse a single-valued `git config` lookup. Empty means unset.
pub fn parse_config_value(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Parse the `branch.<name>.merge` value into a branch name.
///
/// Only `refs/heads/` values (or bare names) name a branch; anything else
/// (`refs/tags/...`, `refs/pull/...`) is not evidence.
pub fn parse_merge_ref(value: &str) -> Option<String> {
    let value = value.trim();
    let branch = match value.strip_prefix("refs/heads/") {
        Some(branch) => branch,
        None if value.starts_with("refs/") => return None,
        None => value,
    };
    is_valid_branch_name(branch).then(|| branch.to_string())
}

/// Parse `git for-each-ref --format=%(refname) <prefix>` output into short
/// names, preserving git's listing order. `<remote>/HEAD` symrefs are skipped.
pub fn parse_ref_list(output: &str, prefix: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(prefix))
        .filter(|name| !name.is_empty() && *name != "HEAD")
        .map(str::to_string)
        .collect()
}

/// Parse `git remote` output.
pub fn parse_remote_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| crate::validate::validate_remote_name(line).is_ok())
        .map(str::to_string)
        .collect()
}

/// Parse the symbolic name from `git rev-parse --abbrev-ref HEAD`.
///
/// Returns `None` for detached HEAD (the literal `HEAD`) and empty output.
pub fn parse_current_branch(output: &str) -> Option<String> {
    let name = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()?;
    if name == "HEAD" || !is_valid_branch_name(name) {
        return None;
    }
    Some(name.to_string())
}

/// Parse the first full object name in `output`.
pub fn parse_object_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| OBJECT_NAME.is_match(line))
        .map(str::to_string)
}

/// Parse `git rev-list --left-right --count A...B` into `(left, right)`:
/// commits only in A, and commits only in B.
pub fn parse_left_right_count(output: &str) -> Result<(usize, usize), GitError> {
    let caps = output
        .lines()
        .map(str::trim)
        .find_map(|line| LEFT_RIGHT_COUNT.captures(line))
        .ok_or_else(|| GitError::ParseError {
            message: format!("Unexpected rev-list output format: {}", output.trim()),
        })?;

    let parse = |name: &str| {
        caps[name].parse::<usize>().map_err(|e| GitError::ParseError {
            message: format!("Failed to parse {name} count: {e}"),
        })
    };

    Ok((parse("left")?, parse("right")?))
}
