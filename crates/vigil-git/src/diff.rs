//! Pull request diff extraction.
//!
//! Renders the unified diff a pull request introduces against the merge base
//! it shares with its target branch, matching `git diff base...head`.

use git2::{DiffFormat, DiffOptions, Oid, Repository};
use tracing::debug;
use vigil_core::VigilError;

use crate::fetch::{branch_ref, pull_head_ref};

/// Unified diff for pull request `number` against `base_branch`.
///
/// Both refs must already be fetched into the working copy (see
/// [`crate::fetch::materialize`]). The left side of the diff is the merge
/// base of the two refs, so commits that landed on the base after the branch
/// point do not show up. A pull request with no changes yields an empty
/// string rather than an error.
///
/// # Errors
///
/// Returns [`VigilError::DiffUnavailable`] if either ref is missing from the
/// working copy, the histories share no common ancestor, or the diff cannot
/// be rendered.
///
/// # Examples
///
/// ```no_run
/// use git2::Repository;
/// use vigil_git::diff::pull_request_diff;
///
/// let repo = Repository::open(".vigil/repo").unwrap();
/// let diff = pull_request_diff(&repo, 42, "main").unwrap();
/// print!("{diff}");
/// ```
pub fn pull_request_diff(
    repo: &Repository,
    number: u64,
    base_branch: &str,
) -> Result<String, VigilError> {
    let head_name = pull_head_ref(number);
    let base_name = branch_ref(base_branch);

    let head_oid = repo
        .refname_to_id(&head_name)
        .map_err(|e| VigilError::DiffUnavailable(format!("cannot resolve {head_name}: {e}")))?;
    let base_oid = repo
        .refname_to_id(&base_name)
        .map_err(|e| VigilError::DiffUnavailable(format!("cannot resolve {base_name}: {e}")))?;

    let merge_base = repo.merge_base(base_oid, head_oid).map_err(|e| {
        VigilError::DiffUnavailable(format!(
            "no merge base between {base_branch} and pull request {number}: {e}"
        ))
    })?;
    debug!(head = %head_oid, merge_base = %merge_base, "diffing against merge base");

    let old_tree = tree_of(repo, merge_base)?;
    let new_tree = tree_of(repo, head_oid)?;

    let mut opts = DiffOptions::new();
    opts.context_lines(3);
    let diff = repo
        .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))
        .map_err(|e| VigilError::DiffUnavailable(format!("failed to compute diff: {e}")))?;

    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => text.push(line.origin()),
            _ => {}
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(|e| VigilError::DiffUnavailable(format!("failed to render diff: {e}")))?;

    Ok(text)
}

fn tree_of(repo: &Repository, oid: Oid) -> Result<git2::Tree<'_>, VigilError> {
    let commit = repo
        .find_commit(oid)
        .map_err(|e| VigilError::DiffUnavailable(format!("failed to find commit {oid}: {e}")))?;
    commit
        .tree()
        .map_err(|e| VigilError::DiffUnavailable(format!("failed to read tree of {oid}: {e}")))
}
