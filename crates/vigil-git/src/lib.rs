//! Git plumbing: fetching pull request branches and extracting their diffs.
//!
//! Materializes a working copy of the target repository with git2, keeps it
//! warm across runs, and renders the unified diff a pull request introduces
//! against the merge base it shares with its target branch.

pub mod diff;
pub mod fetch;
