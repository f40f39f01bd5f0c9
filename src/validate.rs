//! Syntactic validation for branch and remote names.
//!
//! These checks are format-only: they say nothing about whether the ref
//! exists. Every name that crosses the CLI or `serve` boundary goes through
//! them, in both directions, before being interpolated into another git
//! command. The rules follow `git check-ref-format --branch` closely enough to
//! reject anything git would.

use std::sync::LazyLock;

use regex::Regex;

use crate::git::{GitError, NameKind};

const MAX_NAME_LEN: usize = 255;

/// Characters git forbids anywhere in a ref name.
static FORBIDDEN_REF_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x20\x7f~^:?*\[\\]").unwrap());

static REMOTE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// Check that `name` is usable as a branch name.
pub fn validate_branch_name(name: &str) -> Result<&str, GitError> {
    let reject = |reason| Err(invalid(NameKind::Branch, name, reason));

    if name.trim().is_empty() {
        return reject("is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("is too long");
    }
    if name.chars().any(char::is_whitespace) {
        return reject("contains whitespace");
    }
    if FORBIDDEN_REF_CHARS.is_match(name) {
        return reject("contains a character git forbids in ref names");
    }
    if name == "HEAD" {
        return reject("is the symbolic name HEAD");
    }
    if name == "@" || name.contains("@{") {
        return reject("contains a reflog selector");
    }
    if name.contains("..") || name.contains("//") {
        return reject("contains an empty or relative path component");
    }
    if name.starts_with('-') || name.starts_with('/') {
        return reject("starts with '-' or '/'");
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return reject("ends with '/', '.' or '.lock'");
    }
    if name.split('/').any(|component| component.starts_with('.')) {
        return reject("has a component starting with '.'");
    }

    Ok(name)
}

/// Check that `name` is usable as a remote name.
pub fn validate_remote_name(name: &str) -> Result<&str, GitError> {
    let reject = |reason| Err(invalid(NameKind::Remote, name, reason));

    if name.is_empty() {
        return reject("is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("is too long");
    }
    if name.chars().any(char::is_whitespace) {
        return reject("contains whitespace");
    }
    if !REMOTE_NAME.is_match(name) {
        return reject("may only contain letters, digits, '.', '_' and '-'");
    }

    Ok(name)
}

fn invalid(kind: NameKind, name: &str, reason: &'static str) -> GitError {
    GitError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    }
}

/// Convenience predicate for parsers that only need a yes/no answer.
pub fn is_valid_branch_name(name: &str) -> bool {
    validate_branch_name(name).is_ok()
}
