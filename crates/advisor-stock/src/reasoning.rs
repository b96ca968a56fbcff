//! Reasoning backend: prompt in, prose out

use crate::config::{LlmProviderKind, LlmSettings};
use crate::error::{Result, StockError};
use advisor_llm::{CompletionRequest, LLMError, LLMProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// A rendered prompt and the template it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub name: &'static str,
    pub system: Option<String>,
    pub text: String,
}

impl Prompt {
    pub fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            system: None,
            text: text.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// The single seam through which specialists and the consolidator reach a
/// language model
///
/// Constructed once per process and shared by every run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, LLMError>;
}

/// [`ReasoningBackend`] over any [`LLMProvider`]
pub struct LlmReasoner {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_tokens: usize,
    seed: Option<u64>,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: &LlmSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            seed: settings.seed,
        }
    }

    /// Build the configured provider
    pub fn from_settings(settings: &LlmSettings, timeout_secs: u64) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            StockError::ConfigError(format!(
                "no API key configured for the {:?} provider",
                settings.provider
            ))
        })?;

        let provider: Arc<dyn LLMProvider> = match settings.provider {
            LlmProviderKind::OpenAi => {
                use advisor_llm::providers::{OpenAIConfig, OpenAIProvider};
                let mut config = OpenAIConfig::new(api_key).with_timeout(timeout_secs);
                if let Some(base) = &settings.api_base {
                    config = config.with_api_base(base.clone());
                }
                Arc::new(OpenAIProvider::with_config(config).map_err(llm_config_error)?)
            }
            LlmProviderKind::Anthropic => {
                use advisor_llm::providers::{AnthropicConfig, AnthropicProvider};
                let mut config = AnthropicConfig::new(api_key).with_timeout(timeout_secs);
                if let Some(base) = &settings.api_base {
                    config.api_base.clone_from(base);
                }
                Arc::new(AnthropicProvider::with_config(config).map_err(llm_config_error)?)
            }
        };

        Ok(Self::new(provider, settings))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

fn llm_config_error(e: LLMError) -> StockError {
    StockError::ConfigError(format!("failed to build LLM provider: {e}"))
}

#[async_trait]
impl ReasoningBackend for LlmReasoner {
    #[instrument(skip(self, prompt), fields(prompt = prompt.name, provider = self.provider.name()))]
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, LLMError> {
        let mut builder = CompletionRequest::builder(&self.model)
            .prompt(&prompt.text)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .seed(self.seed);
        if let Some(system) = &prompt.system {
            builder = builder.system(system);
        }

        let response = self.provider.complete(builder.build()).await?;
        if response.is_truncated() {
            tracing::warn!(max_tokens = self.max_tokens, "completion hit the token limit");
        }
        let text = response
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LLMError::EmptyCompletion(self.provider.name().to_string()))?;

        tracing::debug!(chars = text.len(), tokens = response.usage.total(), "completion received");
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for LlmReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmReasoner")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}
