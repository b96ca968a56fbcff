//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a completion provider
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport-level failure, including client-side timeouts
    #[cfg(any(feature = "openai", feature = "anthropic"))]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider answered but the body was not what we expected
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// The model returned no text at all
    #[error("Empty completion from {0}")]
    EmptyCompletion(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}
