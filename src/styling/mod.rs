//! Terminal output styling.
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: Primary data output (branch names, JSON, the `serve` protocol)
//! - **stderr**: Status messages (errors, hints, logs)
//!
//! This separation allows piping (`branchwise base-branch | xargs ...`) without
//! status messages interfering.

mod constants;

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprintln, println};

pub use constants::*;

/// Remove ANSI styling, for output that must stay plain (JSON messages).
pub fn strip_ansi(text: &str) -> String {
    anstream::adapter::strip_str(text).to_string()
}
