//! Repository materialization via git2.
//!
//! Guarantees a local working copy of the target repository exists at the
//! scratch location with the pull request's refs fetched. Clones on first
//! use; afterwards the copy is reused and re-fetched, never recreated.

use std::path::Path;

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};
use tracing::{debug, info};
use vigil_core::VigilError;

/// Remote source and refs for one materialization.
///
/// # Examples
///
/// ```
/// use vigil_git::fetch::FetchSpec;
///
/// let spec = FetchSpec {
///     url: "https://github.com/octo/widgets.git".into(),
///     token: None,
///     refspecs: vec![
///         FetchSpec::pull_head_refspec(42),
///         FetchSpec::branch_refspec("main"),
///     ],
/// };
/// assert_eq!(spec.refspecs.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FetchSpec {
    /// Clone URL. HTTPS against a host, or a filesystem path.
    pub url: String,
    /// Access token presented over HTTPS.
    pub token: Option<String>,
    /// Refspecs fetched on every materialization.
    pub refspecs: Vec<String>,
}

impl FetchSpec {
    /// Refspec that pins a pull request head under `origin/pull/<n>/head`.
    ///
    /// Fetching `refs/pull/<n>/head` works for fork pull requests too, where
    /// the head branch lives outside the target repository.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_git::fetch::FetchSpec;
    ///
    /// assert_eq!(
    ///     FetchSpec::pull_head_refspec(7),
    ///     "+refs/pull/7/head:refs/remotes/origin/pull/7/head"
    /// );
    /// ```
    pub fn pull_head_refspec(number: u64) -> String {
        format!("+refs/pull/{number}/head:refs/remotes/origin/pull/{number}/head")
    }

    /// Refspec that tracks a branch under `origin/<branch>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_git::fetch::FetchSpec;
    ///
    /// assert_eq!(
    ///     FetchSpec::branch_refspec("main"),
    ///     "+refs/heads/main:refs/remotes/origin/main"
    /// );
    /// ```
    pub fn branch_refspec(branch: &str) -> String {
        format!("+refs/heads/{branch}:refs/remotes/origin/{branch}")
    }
}

/// Local ref name a fetched pull request head resolves to.
pub fn pull_head_ref(number: u64) -> String {
    format!("refs/remotes/origin/pull/{number}/head")
}

/// Local ref name a fetched branch resolves to.
pub fn branch_ref(branch: &str) -> String {
    format!("refs/remotes/origin/{branch}")
}

/// Ensure a working copy of `spec.url` exists at `path` with the spec's refs
/// fetched from origin.
///
/// An existing copy is opened and updated in place, so repeated runs against
/// the same scratch directory stay cheap and are safe to repeat.
///
/// # Errors
///
/// Returns [`VigilError::Fetch`] when the clone or fetch fails: network
/// problems, rejected credentials, or a damaged working copy.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use vigil_git::fetch::{materialize, FetchSpec};
///
/// let spec = FetchSpec {
///     url: "https://github.com/octo/widgets.git".into(),
///     token: std::env::var("GITHUB_TOKEN").ok(),
///     refspecs: vec![FetchSpec::pull_head_refspec(42)],
/// };
/// let repo = materialize(Path::new(".vigil/repo"), &spec).unwrap();
/// assert!(repo.path().exists());
/// ```
pub fn materialize(path: &Path, spec: &FetchSpec) -> Result<Repository, VigilError> {
    let repo = if path.join(".git").exists() {
        debug!(path = %path.display(), "reusing existing working copy");
        Repository::open(path)
            .map_err(|e| VigilError::Fetch(format!("failed to open working copy: {e}")))?
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(url = %spec.url, path = %path.display(), "cloning repository");
        RepoBuilder::new()
            .fetch_options(fetch_options(spec.token.as_deref()))
            .clone(&spec.url, path)
            .map_err(|e| VigilError::Fetch(format!("failed to clone {}: {e}", spec.url)))?
    };

    if !spec.refspecs.is_empty() {
        let refspecs: Vec<&str> = spec.refspecs.iter().map(String::as_str).collect();
        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| VigilError::Fetch(format!("failed to look up origin remote: {e}")))?;
        remote
            .fetch(
                &refspecs,
                Some(&mut fetch_options(spec.token.as_deref())),
                None,
            )
            .map_err(|e| VigilError::Fetch(format!("failed to fetch from {}: {e}", spec.url)))?;
        debug!(count = refspecs.len(), "fetched pull request refs");
    }

    Ok(repo)
}

fn fetch_options(token: Option<&str>) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        let token = token.to_string();
        callbacks.credentials(move |_url, _username_from_url, _allowed| {
            Cred::userpass_plaintext("x-access-token", &token)
        });
    }
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{RepositoryInitOptions, Signature};

    fn init_origin(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(dir, &opts).unwrap()
    }

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| vec![repo.find_commit(oid).unwrap()])
            .unwrap_or_default();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn materialize_clones_fresh_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let origin_dir = tmp.path().join("origin");
        let origin = init_origin(&origin_dir);
        let tip = commit_file(&origin, "file.txt", "one\n", "initial");

        let spec = FetchSpec {
            url: origin_dir.to_string_lossy().into_owned(),
            token: None,
            refspecs: vec![FetchSpec::branch_refspec("main")],
        };
        let dest = tmp.path().join("work").join("repo");
        let repo = materialize(&dest, &spec).unwrap();

        assert!(dest.join(".git").exists());
        assert_eq!(repo.refname_to_id(&branch_ref("main")).unwrap(), tip);
    }

    #[test]
    fn materialize_reuses_and_updates_existing_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let origin_dir = tmp.path().join("origin");
        let origin = init_origin(&origin_dir);
        commit_file(&origin, "file.txt", "one\n", "initial");

        let spec = FetchSpec {
            url: origin_dir.to_string_lossy().into_owned(),
            token: None,
            refspecs: vec![FetchSpec::branch_refspec("main")],
        };
        let dest = tmp.path().join("repo");
        materialize(&dest, &spec).unwrap();

        // A file dropped into the copy survives the second materialization,
        // proving the copy was updated rather than recreated.
        let marker = dest.join("marker.txt");
        std::fs::write(&marker, "still here").unwrap();

        let new_tip = commit_file(&origin, "file.txt", "one\ntwo\n", "second");
        let repo = materialize(&dest, &spec).unwrap();

        assert!(marker.exists());
        assert_eq!(repo.refname_to_id(&branch_ref("main")).unwrap(), new_tip);
    }

    #[test]
    fn materialize_fetches_pull_request_head() {
        let tmp = tempfile::tempdir().unwrap();
        let origin_dir = tmp.path().join("origin");
        let origin = init_origin(&origin_dir);
        commit_file(&origin, "file.txt", "one\n", "initial");
        let pr_tip = commit_file(&origin, "file.txt", "one\ntwo\n", "pr change");
        origin
            .reference("refs/pull/3/head", pr_tip, true, "pr head")
            .unwrap();

        let spec = FetchSpec {
            url: origin_dir.to_string_lossy().into_owned(),
            token: None,
            refspecs: vec![
                FetchSpec::pull_head_refspec(3),
                FetchSpec::branch_refspec("main"),
            ],
        };
        let dest = tmp.path().join("repo");
        let repo = materialize(&dest, &spec).unwrap();

        assert_eq!(repo.refname_to_id(&pull_head_ref(3)).unwrap(), pr_tip);
    }

    #[test]
    fn materialize_unreachable_remote_is_fetch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = FetchSpec {
            url: tmp.path().join("no-such-origin").to_string_lossy().into_owned(),
            token: None,
            refspecs: vec![FetchSpec::branch_refspec("main")],
        };
        let err = materialize(&tmp.path().join("repo"), &spec).err().unwrap();
        assert!(matches!(err, VigilError::Fetch(_)), "got: {err}");
    }
}
