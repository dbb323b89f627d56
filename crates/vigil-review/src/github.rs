use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use vigil_core::{GitHubConfig, PullRequestInfo, RepoId, VigilError};
use vigil_git::fetch::{materialize, FetchSpec};

/// Source-control host operations the review pipeline depends on.
///
/// One implementation talks to GitHub; tests substitute recording stubs so
/// the pipeline can run without a network or a token.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Look up a pull request's metadata (title, author, branch refs).
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::DiffUnavailable`] if the pull request does not
    /// exist and [`VigilError::Fetch`] for other API failures.
    async fn resolve_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestInfo, VigilError>;

    /// Materialize a local working copy holding the pull request head and
    /// its base branch.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Fetch`] if the clone or fetch fails.
    async fn fetch_repository(
        &self,
        repo: &RepoId,
        pr: &PullRequestInfo,
    ) -> Result<(), VigilError>;

    /// Unified diff the pull request introduces against its merge base.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::DiffUnavailable`] if the working copy or the
    /// required refs are missing.
    async fn pull_request_diff(
        &self,
        repo: &RepoId,
        pr: &PullRequestInfo,
    ) -> Result<String, VigilError>;

    /// Post a comment on the pull request's conversation thread.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Publish`] on API failures.
    async fn create_comment(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<(), VigilError>;
}

/// GitHub client backing [`RepoHost`] for github.com and GitHub Enterprise.
///
/// API calls go through octocrab against the configured base domain; the
/// working copy lives at a fixed path so repeated runs against the same
/// repository fetch instead of re-cloning.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    config: GitHubConfig,
    token: String,
    repo_dir: PathBuf,
}

impl GitHubClient {
    /// Create a client for the configured host.
    ///
    /// The token comes from the configuration or the `GITHUB_TOKEN` /
    /// `GH_TOKEN` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] if no token is available or the API
    /// base URL is invalid, and [`VigilError::Fetch`] if the client cannot
    /// be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vigil_core::GitHubConfig;
    /// use vigil_review::github::GitHubClient;
    ///
    /// let config = GitHubConfig {
    ///     token: Some("ghp_xxxx".into()),
    ///     ..GitHubConfig::default()
    /// };
    /// let client = GitHubClient::new(&config, ".vigil/repo").unwrap();
    /// ```
    pub fn new(config: &GitHubConfig, repo_dir: impl Into<PathBuf>) -> Result<Self, VigilError> {
        let token = config.resolve_token().ok_or_else(|| {
            VigilError::Config(
                "GitHub token not set. Add github.token to .vigil.toml or set GITHUB_TOKEN".into(),
            )
        })?;

        let mut builder = octocrab::Octocrab::builder().personal_token(token.clone());
        if config.base_domain != "github.com" {
            builder = builder.base_uri(config.api_base()).map_err(|e| {
                VigilError::Config(format!(
                    "invalid GitHub API base '{}': {e}",
                    config.api_base()
                ))
            })?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| VigilError::Fetch(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            config: config.clone(),
            token,
            repo_dir: repo_dir.into(),
        })
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn resolve_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestInfo, VigilError> {
        let route = format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name);
        let pull: PullResponse =
            self.octocrab
                .get(route, None::<&()>)
                .await
                .map_err(|e| match e {
                    octocrab::Error::GitHub { ref source, .. }
                        if source.status_code.as_u16() == 404 =>
                    {
                        VigilError::DiffUnavailable(format!(
                            "pull request {repo}#{number} not found"
                        ))
                    }
                    e => VigilError::Fetch(format!(
                        "failed to resolve pull request {repo}#{number}: {e}"
                    )),
                })?;
        Ok(pull.into_info())
    }

    async fn fetch_repository(
        &self,
        repo: &RepoId,
        pr: &PullRequestInfo,
    ) -> Result<(), VigilError> {
        let spec = FetchSpec {
            url: self.config.clone_url(repo),
            token: Some(self.token.clone()),
            refspecs: vec![
                FetchSpec::pull_head_refspec(pr.number),
                FetchSpec::branch_refspec(&pr.base_ref),
            ],
        };
        debug!(url = %spec.url, path = %self.repo_dir.display(), "materializing working copy");
        materialize(&self.repo_dir, &spec)?;
        Ok(())
    }

    async fn pull_request_diff(
        &self,
        _repo: &RepoId,
        pr: &PullRequestInfo,
    ) -> Result<String, VigilError> {
        let repository = git2::Repository::open(&self.repo_dir).map_err(|e| {
            VigilError::DiffUnavailable(format!(
                "working copy at {} is not available: {e}",
                self.repo_dir.display()
            ))
        })?;
        vigil_git::diff::pull_request_diff(&repository, pr.number, &pr.base_ref)
    }

    async fn create_comment(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<(), VigilError> {
        let route = format!("/repos/{}/{}/issues/{number}/comments", repo.owner, repo.name);
        let payload = serde_json::json!({ "body": body });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| VigilError::Publish(format!("failed to post comment: {e}")))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    user: Option<UserResponse>,
    head: BranchResponse,
    base: BranchResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

impl PullResponse {
    fn into_info(self) -> PullRequestInfo {
        PullRequestInfo {
            number: self.number,
            title: self.title,
            author: self.user.map(|u| u.login).unwrap_or_default(),
            head_ref: self.head.ref_name,
            head_sha: self.head.sha,
            base_ref: self.base.ref_name,
        }
    }
}
