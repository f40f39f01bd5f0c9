//! Branchwise error types and formatting
//!
//! **`GitError`** is a typed enum for domain errors that can be pattern-matched
//! and tested. Use `.into()` to convert to `anyhow::Error` while preserving the
//! type for pattern matching. Display produces styled output for users.
//!
//! Inside the branch resolver these errors never escape: every failure is
//! logged and treated as "this evidence source contributes nothing". They
//! surface only at the outer layers (CLI, `serve` loop).

use std::path::PathBuf;
use std::time::Duration;

use color_print::cformat;

use crate::styling::{error_message, hint_message};

/// Which kind of name failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NameKind {
    Branch,
    Remote,
}

/// Domain errors for git queries and branch resolution.
///
/// # Usage
///
/// ```ignore
/// return Err(GitError::DetachedHead { action: Some("diff".into()) }.into());
///
/// if let Some(GitError::CommandTimeout { .. }) = err.downcast_ref() {
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub enum GitError {
    /// The subprocess exited with a non-zero status.
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
    /// The subprocess did not exit in time and its process tree was killed.
    CommandTimeout { command: String, timeout: Duration },
    DetachedHead { action: Option<String> },
    /// No resolution strategy produced a conclusive base branch.
    BaseBranchUnresolved { branch: String },
    InvalidName {
        kind: NameKind,
        name: String,
        reason: &'static str,
    },
    NotADirectory { path: PathBuf },
    ParseError { message: String },
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                exit_code,
                output,
            } => {
                let header = error_message(cformat!(
                    "<bold>{command}</> failed with exit code {exit_code}"
                ));
                let detail = output.trim();
                if detail.is_empty() {
                    write!(f, "{header}")
                } else {
                    write!(f, "{header}\n{detail}")
                }
            }

            GitError::CommandTimeout { command, timeout } => write!(
                f,
                "{}\n{}",
                error_message(cformat!(
                    "<bold>{command}</> timed out after {}s",
                    timeout.as_secs()
                )),
                hint_message(cformat!(
                    "Raise <bright-black>command-timeout</> in the config if this repository is slow"
                ))
            ),

            GitError::DetachedHead { action } => {
                let message = match action {
                    Some(action) => format!("Cannot {action}: not on a branch (detached HEAD)"),
                    None => "Not on a branch (detached HEAD)".to_string(),
                };
                write!(
                    f,
                    "{}\n{}",
                    error_message(&message),
                    hint_message(cformat!(
                        "To switch to a branch, run <bright-black>git switch <<branch>></>"
                    ))
                )
            }

            GitError::BaseBranchUnresolved { branch } => write!(
                f,
                "{}\n{}",
                error_message(cformat!(
                    "Could not determine the base branch of <bold>{branch}</>"
                )),
                hint_message("No reflog, tracking or ancestry evidence was conclusive; pass the base explicitly")
            ),

            GitError::InvalidName { kind, name, reason } => write!(
                f,
                "{}",
                error_message(cformat!("Invalid {kind} name <bold>{name:?}</>: {reason}"))
            ),

            GitError::NotADirectory { path } => write!(
                f,
                "{}",
                error_message(cformat!(
                    "Working directory <bold>{}</> does not exist",
                    path.display()
                ))
            ),

            GitError::ParseError { message } => write!(f, "{}", error_message(message)),
        }
    }
}

impl std::error::Error for GitError {}
