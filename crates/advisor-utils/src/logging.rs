//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize a human-readable tracing subscriber
///
/// `RUST_LOG` overrides `default_filter`; pass `None` to fall back to `info`.
/// Calling it twice is harmless, the second registration is ignored.
pub fn init_tracing(default_filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_filter.unwrap_or(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Initialize a JSON tracing subscriber for log shipping
pub fn init_tracing_json(default_filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_filter.unwrap_or(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing(Some("debug"));
        init_tracing(None);
        init_tracing_json(None);
    }
}
