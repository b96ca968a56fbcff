//! Text completion providers for the PH stocks advisor
//!
//! The advisor only ever needs "prompt in, prose out", so this crate keeps
//! the provider surface small:
//!
//! - [`Message`] / [`Role`] for plain-text conversations
//! - [`CompletionRequest`] / [`CompletionResponse`] with a builder
//! - the [`LLMProvider`] trait every backend implements
//! - OpenAI-compatible and Anthropic providers behind feature flags

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

#[cfg(any(feature = "openai", feature = "anthropic"))]
pub mod providers;
