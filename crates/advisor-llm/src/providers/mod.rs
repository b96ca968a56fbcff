//! Concrete completion providers

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicProvider};
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

/// Map a non-success HTTP status onto our error taxonomy
pub(crate) fn status_error(status: u16, model: &str, body: String) -> crate::LLMError {
    match status {
        401 | 403 => crate::LLMError::AuthenticationFailed,
        429 => crate::LLMError::RateLimitExceeded(body),
        400 => crate::LLMError::InvalidRequest(body),
        404 => crate::LLMError::ModelNotFound(model.to_string()),
        _ => crate::LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LLMError;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "m", String::new()), LLMError::AuthenticationFailed));
        assert!(matches!(status_error(429, "m", String::new()), LLMError::RateLimitExceeded(_)));
        assert!(matches!(status_error(404, "m", String::new()), LLMError::ModelNotFound(m) if m == "m"));
        assert!(matches!(status_error(503, "m", "down".into()), LLMError::RequestFailed(s) if s.contains("503")));
    }
}
