//! Base-branch resolution for PR review tooling.
//!
//! Given a repository and a branch, branchwise works out which branch it was
//! created from, using evidence git already keeps: the reflog, tracking
//! configuration, and commit ancestry. When that evidence is inconclusive it
//! says so instead of guessing.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let dir = Path::new("/path/to/repo");
//! if let Some(branch) = branchwise::git::resolve_current_branch(dir)
//!     && let Some(base) = branchwise::git::resolve_base_branch(dir, &branch, "origin")
//! {
//!     println!("{branch} was created from {base}");
//! }
//! ```
//!
//! The library API is not stable.

pub mod config;
pub mod git;
pub mod server;
pub mod shell_exec;
pub mod styling;
pub mod validate;
