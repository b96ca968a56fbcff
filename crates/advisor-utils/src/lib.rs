//! Shared utilities for the PH stocks advisor
//!
//! Logging setup and the small environment-variable helpers every crate in
//! the workspace reads its settings through.

pub mod env;
pub mod logging;

pub use env::{EnvError, env_duration_secs, env_or, env_parse};
pub use logging::{init_tracing, init_tracing_json};
