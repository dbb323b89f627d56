use std::path::PathBuf;

/// Errors that can occur across the vigil pipeline.
///
/// Each variant wraps a specific failure domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
/// Every variant is fatal for the run except [`VigilError::Publish`], which the
/// publisher catches and downgrades to a warning.
///
/// # Examples
///
/// ```
/// use vigil_core::VigilError;
///
/// let err = VigilError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository materialization failure: network, authorization, or a
    /// damaged working copy.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The pull request reference cannot be resolved to a diff.
    #[error("diff unavailable: {0}")]
    DiffUnavailable(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Review comment creation failure. The run still succeeds once the
    /// review text has been printed.
    #[error("publish error: {0}")]
    Publish(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
