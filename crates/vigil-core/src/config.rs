use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VigilError;
use crate::types::RepoId;

/// Top-level configuration loaded from `.vigil.toml`.
///
/// Supports layered resolution: CLI flags > local config > env vars > defaults.
///
/// # Examples
///
/// ```
/// use vigil_core::VigilConfig;
///
/// let config = VigilConfig::default();
/// assert_eq!(config.github.base_domain, "github.com");
/// assert_eq!(config.review.max_diff_bytes, 50_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Source-control host settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review pipeline behavior.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl VigilConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::FileNotFound`] if `path` does not exist,
    /// [`VigilError::Io`] if the file cannot be read, or
    /// [`VigilError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vigil_core::VigilConfig;
    /// use std::path::Path;
    ///
    /// let config = VigilConfig::from_file(Path::new(".vigil.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, VigilError> {
        if !path.exists() {
            return Err(VigilError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::VigilConfig;
    ///
    /// let toml = r#"
    /// [llm]
    /// model = "gpt-4o-mini"
    /// "#;
    /// let config = VigilConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.llm.model, "gpt-4o-mini");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, VigilError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Source-control host configuration.
///
/// # Examples
///
/// ```
/// use vigil_core::GitHubConfig;
///
/// let config = GitHubConfig::default();
/// assert_eq!(config.api_base(), "https://api.github.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Access token used for the API and for cloning.
    pub token: Option<String>,
    /// Host domain; anything other than `"github.com"` is treated as a
    /// GitHub Enterprise instance.
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
}

fn default_base_domain() -> String {
    "github.com".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_domain: default_base_domain(),
        }
    }
}

impl GitHubConfig {
    /// Resolve the access token: config value, then `GITHUB_TOKEN`, then
    /// `GH_TOKEN`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }

    /// REST API base URL for the configured domain.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::GitHubConfig;
    ///
    /// let mut config = GitHubConfig::default();
    /// assert_eq!(config.api_base(), "https://api.github.com");
    ///
    /// config.base_domain = "github.example.com".into();
    /// assert_eq!(config.api_base(), "https://github.example.com/api/v3");
    /// ```
    pub fn api_base(&self) -> String {
        if self.base_domain == "github.com" {
            "https://api.github.com".into()
        } else {
            format!("https://{}/api/v3", self.base_domain)
        }
    }

    /// HTTPS clone URL for a repository on the configured domain.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::{GitHubConfig, RepoId};
    ///
    /// let config = GitHubConfig::default();
    /// let repo: RepoId = "octo/widgets".parse().unwrap();
    /// assert_eq!(config.clone_url(&repo), "https://github.com/octo/widgets.git");
    /// ```
    pub fn clone_url(&self, repo: &RepoId) -> String {
        format!("https://{}/{}/{}.git", self.base_domain, repo.owner, repo.name)
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use vigil_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.request_timeout_secs, 120);
/// assert_eq!(config.max_retries, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (e.g. `"openai"`, `"anthropic"`, `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra attempts after a failed request (default: 0). Only transport
    /// errors, HTTP 429, and 5xx responses are retried.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// Environment variable carrying the API key for the configured provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::LlmConfig;
    ///
    /// let config = LlmConfig::default();
    /// assert_eq!(config.api_key_env(), "OPENAI_API_KEY");
    /// ```
    pub fn api_key_env(&self) -> &'static str {
        match self.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            "gemini" => "GEMINI_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }

    /// Resolve the API key: config value first, then the provider's
    /// environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(self.api_key_env()).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Review pipeline configuration.
///
/// # Examples
///
/// ```
/// use vigil_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.max_diff_bytes, 50_000);
/// assert_eq!(config.bot_login, "vigil-bot");
/// assert_eq!(config.skip_marker, "[no-review]");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Scratch directory; the repository materializes at `<workdir>/repo`.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Diff budget in bytes before truncation (default: 50000).
    #[serde(default = "default_max_diff_bytes")]
    pub max_diff_bytes: usize,
    /// Login the bot posts as; pull requests it authored are skipped.
    #[serde(default = "default_bot_login")]
    pub bot_login: String,
    /// Title substring that opts a pull request out of review.
    #[serde(default = "default_skip_marker")]
    pub skip_marker: String,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".vigil")
}

fn default_max_diff_bytes() -> usize {
    50_000
}

fn default_bot_login() -> String {
    "vigil-bot".into()
}

fn default_skip_marker() -> String {
    "[no-review]".into()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            max_diff_bytes: default_max_diff_bytes(),
            bot_login: default_bot_login(),
            skip_marker: default_skip_marker(),
        }
    }
}

impl ReviewConfig {
    /// Path the repository working copy materializes at.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::ReviewConfig;
    /// use std::path::PathBuf;
    ///
    /// let config = ReviewConfig::default();
    /// assert_eq!(config.repo_dir(), PathBuf::from(".vigil/repo"));
    /// ```
    pub fn repo_dir(&self) -> PathBuf {
        self.workdir.join("repo")
    }
}
