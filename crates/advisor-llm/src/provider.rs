//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A text completion backend
///
/// Implementations must be safe to share between concurrently running
/// analyses; every call carries its full request and no conversation state is
/// kept between calls.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name used in logs (e.g. "openai", "anthropic")
    fn name(&self) -> &str;
}
