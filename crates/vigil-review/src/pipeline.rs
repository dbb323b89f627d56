use tracing::{info, warn};
use vigil_core::{PullRequestInfo, ReviewConfig, ReviewRequest, VigilError};

use crate::github::RepoHost;
use crate::llm::CompletionClient;
use crate::prompt;

/// Outcome of the comment-publication attempt.
///
/// Publication failing does not fail the run; the review was already
/// computed and printed by then. The failure is carried here so callers
/// can surface it as a warning.
///
/// # Examples
///
/// ```
/// use vigil_review::pipeline::PublishOutcome;
///
/// assert!(PublishOutcome::Published.is_published());
/// assert!(!PublishOutcome::Failed("403".into()).is_published());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The review comment was created on the pull request.
    Published,
    /// Comment creation failed; the message says why.
    Failed(String),
}

impl PublishOutcome {
    /// True when the review comment landed on the pull request.
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

/// Result of a completed review run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The model's review text, verbatim.
    pub review: String,
    /// Whether the review made it onto the pull request.
    pub publication: PublishOutcome,
    /// Statistics about the run.
    pub stats: RunStats,
}

/// Statistics about a review run.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Size of the extracted diff before truncation.
    pub diff_bytes: usize,
    /// Whether the diff was cut down to fit the prompt budget.
    pub diff_truncated: bool,
    /// Size of the rendered prompt.
    pub prompt_bytes: usize,
}

/// Drives one review run from materialization through publication.
///
/// The stages run strictly in order: materialize the repository, extract
/// the pull request diff, request a review from the model, print it, then
/// try to post it as a comment. Any failure before the review text exists
/// is fatal; a failed publication is downgraded to a warning.
pub struct ReviewPipeline<H, C> {
    host: H,
    llm: C,
    review: ReviewConfig,
}

impl<H: RepoHost, C: CompletionClient> ReviewPipeline<H, C> {
    /// Create a pipeline from a host client, a completion client, and
    /// review settings.
    pub fn new(host: H, llm: C, review: ReviewConfig) -> Self {
        Self { host, llm, review }
    }

    /// Look up the pull request this run targets.
    ///
    /// Callers decide from the returned metadata whether to run at all,
    /// so automation-authored or opted-out pull requests cost nothing
    /// beyond this one lookup.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::DiffUnavailable`] if the pull request does
    /// not exist and [`VigilError::Fetch`] for other lookup failures.
    pub async fn resolve(&self, request: &ReviewRequest) -> Result<PullRequestInfo, VigilError> {
        self.host
            .resolve_pull_request(&request.repo, request.number)
            .await
    }

    /// Run the review for a resolved pull request.
    ///
    /// The review text is printed to standard output unconditionally
    /// before publication is attempted, so it survives even when the
    /// comment cannot be created.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Fetch`], [`VigilError::DiffUnavailable`], or
    /// [`VigilError::Llm`] when the corresponding stage fails. Publication
    /// failures do not produce an error; they come back as
    /// [`PublishOutcome::Failed`] in the report.
    pub async fn run(
        &self,
        request: &ReviewRequest,
        pr: &PullRequestInfo,
    ) -> Result<RunReport, VigilError> {
        info!(repo = %request.repo, number = request.number, "materializing repository");
        self.host.fetch_repository(&request.repo, pr).await?;

        info!(base = %pr.base_ref, head = %pr.head_sha, "extracting diff");
        let diff = self.host.pull_request_diff(&request.repo, pr).await?;
        let diff_bytes = diff.len();
        let diff_truncated = diff_bytes > self.review.max_diff_bytes;
        if diff.is_empty() {
            info!("pull request introduces no changes, reviewing anyway");
        }

        let bounded = prompt::truncate_diff(&diff, self.review.max_diff_bytes);
        let rendered = prompt::build_review_prompt(&bounded);
        info!(
            diff_bytes,
            diff_truncated,
            prompt_bytes = rendered.len(),
            "requesting review"
        );
        let review = self.llm.complete(&rendered).await?;

        println!("{review}");

        let publication = match self
            .host
            .create_comment(&request.repo, request.number, &review)
            .await
        {
            Ok(()) => {
                info!(number = request.number, "review comment published");
                PublishOutcome::Published
            }
            Err(e) => {
                warn!(error = %e, "failed to publish review comment");
                PublishOutcome::Failed(e.to_string())
            }
        };

        Ok(RunReport {
            review,
            publication,
            stats: RunStats {
                diff_bytes,
                diff_truncated,
                prompt_bytes: rendered.len(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use vigil_core::RepoId;

    fn make_request() -> ReviewRequest {
        ReviewRequest {
            repo: RepoId {
                owner: "octo".into(),
                name: "widgets".into(),
            },
            number: 42,
        }
    }

    fn make_pr() -> PullRequestInfo {
        PullRequestInfo {
            number: 42,
            title: "Add widget cache".into(),
            author: "octocat".into(),
            head_ref: "feature/cache".into(),
            head_sha: "abc123".into(),
            base_ref: "main".into(),
        }
    }

    #[derive(Clone, Default)]
    struct StubHost {
        diff: String,
        fail_diff: bool,
        fail_publish: bool,
        fetches: Arc<Mutex<usize>>,
        publish_attempts: Arc<Mutex<usize>>,
        comments: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RepoHost for StubHost {
        async fn resolve_pull_request(
            &self,
            _repo: &RepoId,
            _number: u64,
        ) -> Result<PullRequestInfo, VigilError> {
            Ok(make_pr())
        }

        async fn fetch_repository(
            &self,
            _repo: &RepoId,
            _pr: &PullRequestInfo,
        ) -> Result<(), VigilError> {
            *self.fetches.lock().unwrap() += 1;
            Ok(())
        }

        async fn pull_request_diff(
            &self,
            _repo: &RepoId,
            _pr: &PullRequestInfo,
        ) -> Result<String, VigilError> {
            if self.fail_diff {
                return Err(VigilError::DiffUnavailable("pull request ref gone".into()));
            }
            Ok(self.diff.clone())
        }

        async fn create_comment(
            &self,
            _repo: &RepoId,
            _number: u64,
            body: &str,
        ) -> Result<(), VigilError> {
            *self.publish_attempts.lock().unwrap() += 1;
            if self.fail_publish {
                return Err(VigilError::Publish("403 Forbidden".into()));
            }
            self.comments.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    #[derive(Clone)]
    struct StubLlm {
        reply: String,
        fail: bool,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl StubLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                fail: false,
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing() -> Self {
            Self {
                reply: String::new(),
                fail: true,
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for StubLlm {
        async fn complete(&self, prompt: &str) -> Result<String, VigilError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(VigilError::Llm("LLM API error 500: boom".into()));
            }
            Ok(self.reply.clone())
        }
    }

    fn pipeline(host: StubHost, llm: StubLlm) -> ReviewPipeline<StubHost, StubLlm> {
        ReviewPipeline::new(host, llm, ReviewConfig::default())
    }

    #[tokio::test]
    async fn review_is_published_exactly_once_and_verbatim() {
        let host = StubHost {
            diff: "+added line\n".into(),
            ..StubHost::default()
        };
        let llm = StubLlm::replying("LGTM");
        let p = pipeline(host.clone(), llm);

        let report = p.run(&make_request(), &make_pr()).await.unwrap();

        assert_eq!(report.review, "LGTM");
        assert!(report.publication.is_published());
        assert_eq!(*host.publish_attempts.lock().unwrap(), 1);
        assert_eq!(*host.comments.lock().unwrap(), vec!["LGTM".to_string()]);
    }

    #[tokio::test]
    async fn prompt_embeds_the_diff() {
        let host = StubHost {
            diff: "+fn new_widget()\n".into(),
            ..StubHost::default()
        };
        let llm = StubLlm::replying("fine");
        let p = pipeline(host, llm.clone());

        p.run(&make_request(), &make_pr()).await.unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("+fn new_widget()"));
    }

    #[tokio::test]
    async fn publish_failure_is_downgraded_to_a_warning() {
        let host = StubHost {
            diff: "+x\n".into(),
            fail_publish: true,
            ..StubHost::default()
        };
        let llm = StubLlm::replying("LGTM");
        let p = pipeline(host.clone(), llm);

        let report = p.run(&make_request(), &make_pr()).await.unwrap();

        assert_eq!(report.review, "LGTM");
        match report.publication {
            PublishOutcome::Failed(msg) => assert!(msg.contains("403")),
            PublishOutcome::Published => panic!("publication should have failed"),
        }
        assert!(host.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn llm_failure_aborts_before_any_publication() {
        let host = StubHost {
            diff: "+x\n".into(),
            ..StubHost::default()
        };
        let llm = StubLlm::failing();
        let p = pipeline(host.clone(), llm);

        let err = p.run(&make_request(), &make_pr()).await.unwrap_err();

        assert!(matches!(err, VigilError::Llm(_)), "got: {err}");
        assert_eq!(*host.publish_attempts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unresolvable_diff_aborts_before_the_model_is_called() {
        let host = StubHost {
            fail_diff: true,
            ..StubHost::default()
        };
        let llm = StubLlm::replying("never sent");
        let p = pipeline(host, llm.clone());

        let err = p.run(&make_request(), &make_pr()).await.unwrap_err();

        assert!(matches!(err, VigilError::DiffUnavailable(_)), "got: {err}");
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_diff_still_reaches_the_model() {
        let host = StubHost::default();
        let llm = StubLlm::replying("nothing to review");
        let p = pipeline(host, llm.clone());

        let report = p.run(&make_request(), &make_pr()).await.unwrap();

        assert_eq!(report.review, "nothing to review");
        assert!(report.publication.is_published());
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("```diff\n\n```"));
    }

    #[tokio::test]
    async fn repeated_runs_produce_the_same_review() {
        let host = StubHost {
            diff: "+stable\n".into(),
            ..StubHost::default()
        };
        let llm = StubLlm::replying("deterministic review");
        let p = pipeline(host.clone(), llm);

        let first = p.run(&make_request(), &make_pr()).await.unwrap();
        let second = p.run(&make_request(), &make_pr()).await.unwrap();

        assert_eq!(first.review, second.review);
        assert_eq!(*host.fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn oversized_diff_is_truncated_before_rendering() {
        let host = StubHost {
            diff: "+".repeat(100),
            ..StubHost::default()
        };
        let llm = StubLlm::replying("ok");
        let review = ReviewConfig {
            max_diff_bytes: 16,
            ..ReviewConfig::default()
        };
        let p = ReviewPipeline::new(host, llm.clone(), review);

        let report = p.run(&make_request(), &make_pr()).await.unwrap();

        assert!(report.stats.diff_truncated);
        assert_eq!(report.stats.diff_bytes, 100);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains(prompt::TRUNCATION_MARKER));
        assert!(!prompts[0].contains(&"+".repeat(17)));
    }

    #[tokio::test]
    async fn resolve_returns_pull_request_metadata() {
        let p = pipeline(StubHost::default(), StubLlm::replying("x"));
        let pr = p.resolve(&make_request()).await.unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.author, "octocat");
    }
}
