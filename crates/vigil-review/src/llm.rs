use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use vigil_core::{LlmConfig, VigilError};

/// Delay before the first retry; doubles on each subsequent attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use vigil_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this diff".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use vigil_review::llm::Role;
///
/// let role = Role::User;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"user\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Produces review text for a rendered prompt.
///
/// The review pipeline only needs this one capability from a language model,
/// so tests can substitute a canned implementation without touching the
/// network.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the model's reply.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Llm`] when the request fails or the response
    /// cannot be interpreted.
    async fn complete(&self, prompt: &str) -> Result<String, VigilError>;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use vigil_core::LlmConfig;
/// use vigil_review::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

enum RequestFailure {
    Retryable(String),
    Fatal(String),
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Llm`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::LlmConfig;
    /// use vigil_review::llm::LlmClient;
    ///
    /// let client = LlmClient::new(&LlmConfig::default()).unwrap();
    /// ```
    pub fn new(config: &LlmConfig) -> Result<Self, VigilError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VigilError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat completion request and return the text response.
    ///
    /// Builds a request to `{base_url}/v1/chat/completions` with the given
    /// messages. Transport errors, HTTP 429, and 5xx responses are retried
    /// up to `max_retries` times with exponential backoff; other failures
    /// are returned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Llm`] on HTTP errors or response parsing
    /// failures once retries are exhausted.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, VigilError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        let url = format!("{base_url}/v1/chat/completions");

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.1,
        });

        let mut attempt: u32 = 0;
        loop {
            let failure = match self.send_once(&url, &body).await {
                Ok(content) => return Ok(content),
                Err(failure) => failure,
            };
            let retryable = matches!(failure, RequestFailure::Retryable(_));
            let (RequestFailure::Retryable(msg) | RequestFailure::Fatal(msg)) = failure;
            if !retryable || attempt >= self.config.max_retries {
                return Err(VigilError::Llm(msg));
            }
            attempt += 1;
            let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << (attempt - 1));
            warn!(attempt, error = %msg, "LLM request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, RequestFailure> {
        let mut request = self.client.post(url);
        if let Some(api_key) = self.config.resolve_api_key() {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        request = request.header("Content-Type", "application/json");

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| RequestFailure::Retryable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let msg = format!("LLM API error {status}: {body_text}");
            return Err(if is_retryable_status(status) {
                RequestFailure::Retryable(msg)
            } else {
                RequestFailure::Fatal(msg)
            });
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RequestFailure::Fatal(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                RequestFailure::Fatal(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, VigilError> {
        self.chat(vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }])
        .await
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
