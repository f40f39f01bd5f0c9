//! Base-branch resolution
//!
//! Determines which branch a branch was created from, using evidence that git
//! keeps anyway. Strategies run in a fixed order and the first conclusive one
//! wins outright:
//!
//! 1. [`Strategy::Reflog`]: `branch: Created from X` / `checkout: moving from X to <branch>`
//! 2. [`Strategy::TrackingConfig`]: `branch.<name>.merge`
//! 3. [`Strategy::MergeBase`]: the unique nearest ancestor branch
//!
//! When none is conclusive the answer is `None`. There is no default branch
//! name to fall back on; callers that want one apply it themselves.
//!
//! Every failure inside a strategy (a git command failing or timing out,
//! unparseable output) is logged at debug level and counts as "no evidence".

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use super::parse::parse_reflog_source;
use super::{BaseBranch, BranchCandidate, Repository, parse};
use crate::validate::{is_valid_branch_name, validate_branch_name, validate_remote_name};

/// One source of evidence about a branch's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    Reflog,
    TrackingConfig,
    MergeBase,
}

impl Strategy {
    /// Evaluation order. Earlier strategies are more direct evidence.
    pub const ORDER: [Strategy; 3] = [
        Strategy::Reflog,
        Strategy::TrackingConfig,
        Strategy::MergeBase,
    ];
}

/// What a single strategy concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    Found(BaseBranch),
    NoEvidence,
    /// Several candidates qualified and none descends from all the others.
    Ambiguous {
        survivors: usize,
    },
}

/// Resolves current and base branches for one working directory.
///
/// Holds no state between calls beyond the repository location and timeout.
#[derive(Debug, Clone)]
pub struct BranchResolver {
    repo: Repository,
}

impl BranchResolver {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self::new(Repository::at(dir.as_ref()))
    }

    /// Deadline for each git invocation the resolver makes.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::new(self.repo.with_timeout(timeout))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The checked-out branch, or `None` when HEAD is detached or git fails.
    pub fn current_branch(&self) -> Option<String> {
        match self.repo.current_branch() {
            Ok(branch) => branch,
            Err(e) => {
                log::debug!("Could not read current branch: {e:#}");
                None
            }
        }
    }

    /// The branch `current` was most likely created from.
    ///
    /// `remote` qualifies the answer when nothing better is known and scopes
    /// which remote-tracking branches merge-base analysis considers.
    pub fn base_branch(&self, current: &str, remote: &str) -> Option<BaseBranch> {
        if let Err(e) = validate_branch_name(current).and(validate_remote_name(remote)) {
            log::debug!("Not resolving base branch: {e}");
            return None;
        }

        let resolution = Resolution::new(&self.repo, current, remote);
        for strategy in Strategy::ORDER {
            match resolution.evaluate(strategy) {
                Ok(Evidence::Found(base)) => {
                    log::debug!("Base of {current} is {base} (from {strategy})");
                    return Some(base);
                }
                Ok(Evidence::NoEvidence) => {
                    log::debug!("{strategy}: no evidence for {current}");
                }
                Ok(Evidence::Ambiguous { survivors }) => {
                    log::debug!("{strategy}: {survivors} unrelated candidates for {current}");
                }
                Err(e) => {
                    log::debug!("{strategy}: failed for {current}: {e:#}");
                }
            }
        }

        log::debug!("Base of {current} is unresolved");
        None
    }

    /// Run a single strategy, without falling through to the others.
    pub fn evaluate(&self, strategy: Strategy, current: &str, remote: &str) -> Evidence {
        if validate_branch_name(current)
            .and(validate_remote_name(remote))
            .is_err()
        {
            return Evidence::NoEvidence;
        }
        Resolution::new(&self.repo, current, remote)
            .evaluate(strategy)
            .unwrap_or_else(|e| {
                log::debug!("{strategy}: failed for {current}: {e:#}");
                Evidence::NoEvidence
            })
    }
}

/// The checked-out branch in `dir`, or `None` when HEAD is detached or git fails.
pub fn resolve_current_branch(dir: &Path) -> Option<String> {
    BranchResolver::at(dir).current_branch()
}

/// The branch `current` was created from, qualified by its remote.
///
/// Returns `None` rather than guessing when the evidence is inconclusive.
pub fn resolve_base_branch(dir: &Path, current: &str, remote: &str) -> Option<BaseBranch> {
    BranchResolver::at(dir).base_branch(current, remote)
}

/// State for one `base_branch` call.
struct Resolution<'a> {
    repo: &'a Repository,
    current: &'a str,
    remote: &'a str,
    /// Configured remotes, read once per call.
    remotes: Vec<String>,
}

impl<'a> Resolution<'a> {
    fn new(repo: &'a Repository, current: &'a str, remote: &'a str) -> Self {
        let remotes = repo.remotes().unwrap_or_else(|e| {
            log::debug!("Could not list remotes: {e:#}");
            Vec::new()
        });
        Self {
            repo,
            current,
            remote,
            remotes,
        }
    }

    fn evaluate(&self, strategy: Strategy) -> anyhow::Result<Evidence> {
        match strategy {
            Strategy::Reflog => self.from_reflog(),
            Strategy::TrackingConfig => self.from_tracking_config(),
            Strategy::MergeBase => self.from_merge_base(),
        }
    }

    fn current_ref(&self) -> String {
        format!("refs/heads/{}", self.current)
    }

    /// Remote prefixes that may be stripped from a reflog source.
    fn strippable_remotes(&self) -> Vec<String> {
        let mut names = self.remotes.clone();
        if !names.iter().any(|r| r == self.remote) {
            names.push(self.remote.to_string());
        }
        names
    }

    fn from_reflog(&self) -> anyhow::Result<Evidence> {
        let strippable = self.strippable_remotes();

        let own = self.repo.reflog(&self.current_ref())?;
        let from_own = own.iter().find_map(|entry| {
            let source = entry
                .created_from()
                .or_else(|| entry.checked_out_from(self.current))?;
            self.accept_source(source, &strippable)
        });

        // `git checkout -b x` records "Created from HEAD" in the branch's own
        // reflog; the branch it actually started from is in the HEAD reflog.
        let source = match from_own {
            Some(source) => Some(source),
            None => self.repo.reflog("HEAD")?.iter().find_map(|entry| {
                let source = entry.checked_out_from(self.current)?;
                self.accept_source(source, &strippable)
            }),
        };

        Ok(match source {
            Some(source) => {
                let remote = self.remote_for(&source.branch, source.remote.as_deref());
                Evidence::Found(BaseBranch::new(remote, source.branch))
            }
            None => Evidence::NoEvidence,
        })
    }

    fn accept_source(&self, source: &str, strippable: &[String]) -> Option<parse::SourceBranch> {
        let parsed = parse_reflog_source(source, strippable);
        match parsed {
            Some(parsed) if parsed.branch != self.current => Some(parsed),
            _ => {
                log::debug!("  reflog source {source:?} is not a base branch");
                None
            }
        }
    }

    fn from_tracking_config(&self) -> anyhow::Result<Evidence> {
        let key = format!("branch.{}.merge", self.current);
        let Some(branch) = self
            .repo
            .get_config(&key)?
            .as_deref()
            .and_then(parse::parse_merge_ref)
        else {
            return Ok(Evidence::NoEvidence);
        };
        if branch == self.current {
            log::debug!("  {key} points at the branch itself");
            return Ok(Evidence::NoEvidence);
        }

        let tracking_remote = self
            .repo
            .get_config(&format!("branch.{}.remote", self.current))?
            .filter(|r| self.is_configured_remote(r));
        let remote = match tracking_remote {
            Some(remote) => remote,
            None => self.remote_for(&branch, None),
        };

        Ok(Evidence::Found(BaseBranch::new(remote, branch)))
    }

    fn from_merge_base(&self) -> anyhow::Result<Evidence> {
        let current_ref = self.current_ref();
        let current_tip = self.repo.rev_parse(&current_ref)?;

        let mut qualified = Vec::new();
        for candidate in self.candidates()? {
            if let Some(candidate) = self.qualify(candidate, &current_ref, &current_tip) {
                qualified.push(candidate);
            }
        }

        let outcome = pick_nearest_ancestor(qualified, |newer, best| {
            self.repo
                .is_strictly_ahead(&newer.ref_name(), &best.ref_name())
                .unwrap_or_else(|e| {
                    log::debug!("  could not compare {newer} with {best}: {e:#}");
                    false
                })
        });

        Ok(match outcome {
            Pick::One(winner) => {
                let remote = match &winner.remote {
                    Some(remote) => remote.clone(),
                    None => self.remote_for(&winner.name, None),
                };
                Evidence::Found(BaseBranch::new(remote, winner.name))
            }
            Pick::None => Evidence::NoEvidence,
            Pick::Ambiguous(survivors) => Evidence::Ambiguous { survivors },
        })
    }

    /// Local branches other than the current one, then remote-tracking branches
    /// under the caller's remote that have no local counterpart.
    fn candidates(&self) -> anyhow::Result<Vec<BranchCandidate>> {
        let locals = self.repo.local_branches()?;
        let remote_branches = match self.repo.remote_branches(self.remote) {
            Ok(branches) => branches,
            Err(e) => {
                log::debug!("  could not list {} branches: {e:#}", self.remote);
                Vec::new()
            }
        };

        let local_names: HashSet<&str> = locals.iter().map(String::as_str).collect();
        let remote_only: Vec<_> = remote_branches
            .iter()
            .filter(|name| !local_names.contains(name.as_str()) && *name != self.current)
            .map(|name| BranchCandidate::remote(self.remote, name.as_str()))
            .collect();

        Ok(locals
            .iter()
            .filter(|name| *name != self.current)
            .map(|name| BranchCandidate::local(name.as_str()))
            .chain(remote_only)
            .filter(|candidate| is_valid_branch_name(&candidate.name))
            .collect())
    }

    /// Keep `candidate` only if the current branch has commits it lacks.
    fn qualify(
        &self,
        mut candidate: BranchCandidate,
        current_ref: &str,
        current_tip: &str,
    ) -> Option<BranchCandidate> {
        let candidate_ref = candidate.ref_name();

        let merge_base = match self.repo.merge_base(current_ref, &candidate_ref) {
            Ok(Some(merge_base)) => merge_base,
            Ok(None) => {
                log::debug!("  {candidate}: no common history");
                return None;
            }
            Err(e) => {
                log::debug!("  {candidate}: merge-base failed: {e:#}");
                return None;
            }
        };
        if merge_base == current_tip {
            log::debug!("  {candidate}: {} has no commits of its own", self.current);
            return None;
        }

        // The candidate may have moved on since the fork; only commits it
        // lacks matter here. Ancestry between candidates is settled by the fold.
        let (ahead, behind) = match self.repo.ahead_behind(&candidate_ref, current_ref) {
            Ok(counts) => counts,
            Err(e) => {
                log::debug!("  {candidate}: rev-list failed: {e:#}");
                return None;
            }
        };
        if ahead == 0 {
            log::debug!("  {candidate}: {} has no commits it lacks", self.current);
            return None;
        }
        log::trace!("  {candidate}: qualifies (ahead {ahead}, behind {behind})");

        candidate.merge_base_commit = Some(merge_base);
        candidate.ahead_count = Some(ahead);
        Some(candidate)
    }

    fn is_configured_remote(&self, name: &str) -> bool {
        self.remotes.iter().any(|r| r == name)
    }

    /// Pick the remote that qualifies `branch`.
    ///
    /// In order: the remote named in the evidence itself, the branch's own
    /// `branch.<name>.remote`, the first remote that has the branch (caller's
    /// remote first), and finally the caller's remote.
    fn remote_for(&self, branch: &str, named: Option<&str>) -> String {
        if let Some(remote) = named {
            return remote.to_string();
        }

        match self.repo.get_config(&format!("branch.{branch}.remote")) {
            Ok(Some(remote)) if self.is_configured_remote(&remote) => return remote,
            Ok(_) => {}
            Err(e) => log::debug!("  could not read tracking remote of {branch}: {e:#}"),
        }

        let probe_order = std::iter::once(self.remote)
            .filter(|r| self.is_configured_remote(r))
            .chain(
                self.remotes
                    .iter()
                    .map(String::as_str)
                    .filter(|r| *r != self.remote),
            );
        for remote in probe_order {
            match self.repo.ref_exists(&format!("refs/remotes/{remote}/{branch}")) {
                Ok(true) => return remote.to_string(),
                Ok(false) => {}
                Err(e) => log::debug!("  could not probe {remote}/{branch}: {e:#}"),
            }
        }

        self.remote.to_string()
    }
}

/// Result of folding qualified candidates down to one.
#[derive(Debug, PartialEq, Eq)]
enum Pick<T> {
    None,
    One(T),
    Ambiguous(usize),
}

/// Fold candidates into the unique one every other candidate is an ancestor of.
///
/// `is_strictly_ahead(a, b)` reports whether `a` descends from `b` with extra
/// commits. A candidate that descends from the running best replaces it and
/// resets the survivor count to one; a candidate the best descends from is
/// dropped; an unrelated candidate adds a survivor.
fn pick_nearest_ancestor<F>(
    candidates: Vec<BranchCandidate>,
    mut is_strictly_ahead: F,
) -> Pick<BranchCandidate>
where
    F: FnMut(&BranchCandidate, &BranchCandidate) -> bool,
{
    let mut best: Option<BranchCandidate> = None;
    let mut survivors = 0;

    for candidate in candidates {
        let Some(current_best) = &best else {
            best = Some(candidate);
            survivors = 1;
            continue;
        };

        if is_strictly_ahead(&candidate, current_best) {
            log::debug!("  {candidate} descends from {current_best}");
            best = Some(candidate);
            survivors = 1;
        } else if is_strictly_ahead(current_best, &candidate) {
            log::debug!("  {current_best} descends from {candidate}");
        } else {
            log::debug!("  {candidate} and {current_best} are unrelated");
            survivors += 1;
        }
    }

    match best {
        None => Pick::None,
        Some(best) if survivors == 1 => Pick::One(best),
        Some(_) => Pick::Ambiguous(survivors),
    }
}
