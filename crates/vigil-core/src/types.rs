use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A repository addressed as `owner/name`.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument
/// parsing.
///
/// # Examples
///
/// ```
/// use vigil_core::RepoId;
///
/// let repo: RepoId = "octo/widgets".parse().unwrap();
/// assert_eq!(repo.owner, "octo");
/// assert_eq!(repo.name, "widgets");
/// assert_eq!(repo.to_string(), "octo/widgets");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoId {
    /// Account or organization that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner, name)) = s.split_once('/') else {
            return Err(format!("expected owner/name, got: {s}"));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(format!("expected owner/name, got: {s}"));
        }
        Ok(Self {
            owner: owner.into(),
            name: name.into(),
        })
    }
}

/// One review invocation: which pull request of which repository.
///
/// Created from invocation parameters and immutable for the run.
///
/// # Examples
///
/// ```
/// use vigil_core::{RepoId, ReviewRequest};
///
/// let request = ReviewRequest {
///     repo: "octo/widgets".parse().unwrap(),
///     number: 42,
/// };
/// assert_eq!(request.number, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    /// The target repository.
    pub repo: RepoId,
    /// Pull request number within that repository.
    pub number: u64,
}

/// Pull request metadata resolved from the host API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    /// Pull request number.
    pub number: u64,
    /// Title as it appears on the host.
    pub title: String,
    /// Login of the author.
    pub author: String,
    /// Branch name of the head.
    pub head_ref: String,
    /// Commit SHA at the head when the metadata was resolved.
    pub head_sha: String,
    /// Branch name the pull request targets.
    pub base_ref: String,
}

/// Why a pull request was not reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Authored by the bot itself.
    OwnAuthor,
    /// Authored by an automation account.
    BotAuthor,
    /// Title carries the skip marker.
    MarkedTitle,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OwnAuthor => write!(f, "authored by the bot itself"),
            SkipReason::BotAuthor => write!(f, "authored by an automation account"),
            SkipReason::MarkedTitle => write!(f, "title carries the skip marker"),
        }
    }
}

/// Decides whether a pull request should be reviewed at all.
///
/// Applied by the caller before the pipeline runs, so reviewing a bot's own
/// pull requests cannot loop: the bot posts a review, automation reacts with
/// another pull request, and so on.
///
/// # Examples
///
/// ```
/// use vigil_core::{PullRequestInfo, TriggerPolicy};
///
/// let policy = TriggerPolicy::new("vigil-bot", "[no-review]");
/// let pr = PullRequestInfo {
///     number: 7,
///     title: "Fix flaky test".into(),
///     author: "alice".into(),
///     head_ref: "fix-test".into(),
///     head_sha: "0123abc".into(),
///     base_ref: "main".into(),
/// };
/// assert!(policy.skip_reason(&pr).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    bot_login: String,
    skip_marker: String,
}

impl TriggerPolicy {
    /// Create a policy for the given bot login and title marker.
    pub fn new(bot_login: impl Into<String>, skip_marker: impl Into<String>) -> Self {
        Self {
            bot_login: bot_login.into(),
            skip_marker: skip_marker.into(),
        }
    }

    /// Returns why `pr` should be skipped, or `None` if it should be
    /// reviewed.
    ///
    /// Skips the bot's own pull requests, pull requests from `[bot]`
    /// accounts, and pull requests whose title contains the skip marker.
    pub fn skip_reason(&self, pr: &PullRequestInfo) -> Option<SkipReason> {
        if pr.author == self.bot_login {
            return Some(SkipReason::OwnAuthor);
        }
        if pr.author.ends_with("[bot]") {
            return Some(SkipReason::BotAuthor);
        }
        if !self.skip_marker.is_empty() && pr.title.contains(&self.skip_marker) {
            return Some(SkipReason::MarkedTitle);
        }
        None
    }
}
