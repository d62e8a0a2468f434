//! Error types for the askdb pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AskError>;

#[derive(Error, Debug)]
pub enum AskError {
    /// Database or schema introspection unreachable. Fatal to the run,
    /// reported before any stage starts.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// The model failed to produce a conforming query. Aborts the run.
    #[error("query generation failed: {0}")]
    GenerationError(String),

    /// The database rejected or failed the generated query. Only surfaced
    /// as an error under `ExecutionErrorPolicy::Abort`; the default policy
    /// converts it to a diagnostic result string instead.
    #[error("query execution failed: {0}")]
    ExecutionError(String),

    /// The model failed to produce a final answer. Aborts the run, no
    /// fallback answer.
    #[error("answer synthesis failed: {0}")]
    SynthesisError(String),

    /// Transport-level model call failure. The owning stage wraps this
    /// into `GenerationError` or `SynthesisError`.
    #[error("model call failed: {0}")]
    LlmError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AskError {
    /// Stable kind name, used in logs and failure reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            AskError::ConnectionError(_) => "connection",
            AskError::GenerationError(_) => "generation",
            AskError::ExecutionError(_) => "execution",
            AskError::SynthesisError(_) => "synthesis",
            AskError::LlmError(_) => "llm",
            AskError::ConfigError(_) => "config",
            AskError::ValidationError(_) => "validation",
            AskError::JsonError(_) => "json",
            AskError::IoError(_) => "io",
        }
    }
}
