//! Configuration for the advisor workflow

use crate::error::{Result, StockError};
use advisor_utils::{env_duration_secs, env_or, env_parse};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DRAGONFI_BASE_URL: &str = "https://api.dragonfi.ph/api/v2";
pub const DEFAULT_PSE_EDGE_BASE_URL: &str = "https://edge.pse.com.ph";
pub const DEFAULT_TRADINGVIEW_SCANNER_URL: &str =
    "https://scanner.tradingview.com/philippines/scan";

/// Which completion provider backs the reasoning steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl FromStr for LlmProviderKind {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(StockError::ConfigError(format!(
                "unknown LLM provider '{other}' (expected openai or anthropic)"
            ))),
        }
    }
}

/// Report store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(StockError::ConfigError(format!(
                "unknown storage backend '{other}' (expected sqlite or memory)"
            ))),
        }
    }
}

/// Reasoning backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,

    /// Sampling seed for providers that support one
    pub seed: Option<u64>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Overrides the provider's default endpoint
    pub api_base: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            seed: None,
            api_key: None,
            api_base: None,
        }
    }
}

/// Upstream endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub dragonfi_base_url: String,
    pub pse_edge_base_url: String,
    pub tradingview_scanner_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dragonfi_base_url: DEFAULT_DRAGONFI_BASE_URL.to_string(),
            pse_edge_base_url: DEFAULT_PSE_EDGE_BASE_URL.to_string(),
            tradingview_scanner_url: DEFAULT_TRADINGVIEW_SCANNER_URL.to_string(),
        }
    }
}

/// Tunable analysis thresholds
///
/// Percentages are expressed as percent (`3.0` is 3 %), daily returns and
/// volatility as fractions (`0.05` is 5 %).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum dividend yield (%) for the dividend-play catalyst
    pub catalyst_yield_pct: f64,
    /// Minimum 52-week range position (%) for the dividend-play catalyst
    pub catalyst_range_pct: f64,
    /// Minimum day change (%) for the momentum catalyst
    pub catalyst_day_change_pct: f64,
    /// Maximum distance (%) from the 52-week extremes to count as "near"
    pub near_extreme_pct: f64,

    pub trend_up_pct: f64,
    pub trend_down_pct: f64,

    pub spike_std_multiplier: f64,
    pub spike_min_abs_return: f64,
    pub spike_window: usize,
    pub high_volatility: f64,
    pub overvaluation_multiplier: f64,
    pub distress_multiplier: f64,

    pub candle_body_pct: f64,
    pub candle_top_n: usize,
    pub gap_pct: f64,
    pub volume_spike_multiplier: f64,
    pub volume_window: usize,
    pub streak_min: usize,

    /// Share of income a REIT must distribute
    pub reit_payout_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            catalyst_yield_pct: 3.0,
            catalyst_range_pct: 65.0,
            catalyst_day_change_pct: 0.5,
            near_extreme_pct: 5.0,
            trend_up_pct: 5.0,
            trend_down_pct: -5.0,
            spike_std_multiplier: 3.0,
            spike_min_abs_return: 0.05,
            spike_window: 20,
            high_volatility: 0.04,
            overvaluation_multiplier: 1.3,
            distress_multiplier: 0.7,
            candle_body_pct: 5.0,
            candle_top_n: 5,
            gap_pct: 2.0,
            volume_spike_multiplier: 3.0,
            volume_window: 20,
            streak_min: 3,
            reit_payout_floor: 0.9,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    pub llm: LlmSettings,
    pub endpoints: Endpoints,
    pub thresholds: Thresholds,

    pub storage_backend: StorageBackend,
    pub sqlite_path: PathBuf,

    /// Deadline for each upstream HTTP call
    pub request_timeout: Duration,
    /// Deadline for a whole specialist run (data + reasoning)
    pub specialist_timeout: Duration,
    pub consolidation_timeout: Duration,

    /// Per-client request budget
    pub requests_per_minute: u32,

    pub cache_ttl_directory: Duration,
    pub cache_ttl_profile: Duration,

    pub history_days: u32,
    pub news_limit: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            endpoints: Endpoints::default(),
            thresholds: Thresholds::default(),
            storage_backend: StorageBackend::Sqlite,
            sqlite_path: PathBuf::from("reports.db"),
            request_timeout: Duration::from_secs(15),
            specialist_timeout: Duration::from_secs(120),
            consolidation_timeout: Duration::from_secs(180),
            requests_per_minute: 60,
            cache_ttl_directory: Duration::from_secs(6 * 3600),
            cache_ttl_profile: Duration::from_secs(300),
            history_days: 365,
            news_limit: 5,
        }
    }
}

impl AdvisorConfig {
    pub fn builder() -> AdvisorConfigBuilder {
        AdvisorConfigBuilder::default()
    }

    /// Build a configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let env_err = |e: advisor_utils::EnvError| StockError::ConfigError(e.to_string());

        let provider: LlmProviderKind = env_or("LLM_PROVIDER", "openai").parse()?;
        let api_key = match provider {
            LlmProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
            LlmProviderKind::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
        };

        let llm = LlmSettings {
            provider,
            model: env_or("OPENAI_MODEL", &defaults.llm.model),
            temperature: env_parse("OPENAI_TEMPERATURE", defaults.llm.temperature)
                .map_err(env_err)?,
            max_tokens: env_parse("LLM_MAX_TOKENS", defaults.llm.max_tokens).map_err(env_err)?,
            seed: std::env::var("LLM_SEED")
                .ok()
                .map(|raw| {
                    raw.trim().parse().map_err(|_| {
                        StockError::ConfigError(format!(
                            "LLM_SEED must be an integer, got '{raw}'"
                        ))
                    })
                })
                .transpose()?,
            api_key,
            api_base: std::env::var("OPENAI_API_BASE").ok().filter(|s| !s.trim().is_empty()),
        };

        let endpoints = Endpoints {
            dragonfi_base_url: env_or("DRAGONFI_BASE_URL", DEFAULT_DRAGONFI_BASE_URL),
            pse_edge_base_url: env_or("PSE_EDGE_BASE_URL", DEFAULT_PSE_EDGE_BASE_URL),
            tradingview_scanner_url: env_or(
                "TRADINGVIEW_SCANNER_URL",
                DEFAULT_TRADINGVIEW_SCANNER_URL,
            ),
        };

        Self::builder()
            .llm(llm)
            .endpoints(endpoints)
            .storage_backend(env_or("DB_BACKEND", "sqlite").parse()?)
            .sqlite_path(env_or("SQLITE_PATH", "reports.db"))
            .request_timeout(
                env_duration_secs("HTTP_TIMEOUT_SECS", defaults.request_timeout).map_err(env_err)?,
            )
            .specialist_timeout(
                env_duration_secs("SPECIALIST_TIMEOUT_SECS", defaults.specialist_timeout)
                    .map_err(env_err)?,
            )
            .build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, raw) in [
            ("dragonfi_base_url", &self.endpoints.dragonfi_base_url),
            ("pse_edge_base_url", &self.endpoints.pse_edge_base_url),
            ("tradingview_scanner_url", &self.endpoints.tradingview_scanner_url),
        ] {
            url::Url::parse(raw)
                .map_err(|e| StockError::ConfigError(format!("{name} '{raw}' is not a URL: {e}")))?;
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(StockError::ConfigError(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(StockError::ConfigError("model must not be empty".to_string()));
        }

        if self.request_timeout.is_zero()
            || self.specialist_timeout.is_zero()
            || self.consolidation_timeout.is_zero()
        {
            return Err(StockError::ConfigError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        let t = &self.thresholds;
        if t.trend_down_pct >= t.trend_up_pct {
            return Err(StockError::ConfigError(
                "trend_down_pct must be below trend_up_pct".to_string(),
            ));
        }
        if !(t.distress_multiplier < 1.0 && t.overvaluation_multiplier > 1.0) {
            return Err(StockError::ConfigError(
                "distress multiplier must be < 1 and overvaluation multiplier > 1".to_string(),
            ));
        }
        if t.spike_window < 5 || t.volume_window < 5 {
            return Err(StockError::ConfigError(
                "rolling windows need at least 5 periods".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AdvisorConfig
#[derive(Debug, Default)]
pub struct AdvisorConfigBuilder {
    llm: Option<LlmSettings>,
    endpoints: Option<Endpoints>,
    thresholds: Option<Thresholds>,
    storage_backend: Option<StorageBackend>,
    sqlite_path: Option<PathBuf>,
    request_timeout: Option<Duration>,
    specialist_timeout: Option<Duration>,
    consolidation_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
    history_days: Option<u32>,
}

impl AdvisorConfigBuilder {
    pub fn llm(mut self, llm: LlmSettings) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
        self.storage_backend = Some(backend);
        self
    }

    pub fn sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn specialist_timeout(mut self, duration: Duration) -> Self {
        self.specialist_timeout = Some(duration);
        self
    }

    pub fn consolidation_timeout(mut self, duration: Duration) -> Self {
        self.consolidation_timeout = Some(duration);
        self
    }

    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    pub fn history_days(mut self, days: u32) -> Self {
        self.history_days = Some(days);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AdvisorConfig> {
        let defaults = AdvisorConfig::default();

        let config = AdvisorConfig {
            llm: self.llm.unwrap_or(defaults.llm),
            endpoints: self.endpoints.unwrap_or(defaults.endpoints),
            thresholds: self.thresholds.unwrap_or(defaults.thresholds),
            storage_backend: self.storage_backend.unwrap_or(defaults.storage_backend),
            sqlite_path: self.sqlite_path.unwrap_or(defaults.sqlite_path),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            specialist_timeout: self.specialist_timeout.unwrap_or(defaults.specialist_timeout),
            consolidation_timeout: self
                .consolidation_timeout
                .unwrap_or(defaults.consolidation_timeout),
            requests_per_minute: self.requests_per_minute.unwrap_or(defaults.requests_per_minute),
            history_days: self.history_days.unwrap_or(defaults.history_days),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}
