//! Upstream market data sources
//!
//! Every client implements [`MarketDataSource`]. A capability a source does
//! not offer, or a symbol it knows nothing about, is `Ok(None)`; transport
//! and decoding failures are `Err`. The data layer treats both the same way
//! and moves on to the next source.

pub mod dragonfi;
pub mod http;
pub mod pse_edge;
pub mod tradingview;
pub mod yahoo;

pub use dragonfi::DragonFiClient;
pub use http::RateLimitedClient;
pub use pse_edge::PseEdgeClient;
pub use tradingview::TradingViewClient;
pub use yahoo::YahooFinanceClient;

use crate::domain::Symbol;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// What a source can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Lookup,
    Profile,
    Valuation,
    FinancialTrends,
    DailyHistory,
    Performance,
    News,
}

/// Snapshot of a listed stock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub week_high_52: Option<f64>,
    pub week_low_52: Option<f64>,
    /// Yield as reported upstream, usually a percentage (5.54)
    pub dividend_yield_pct: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub is_reit: bool,
    pub currency: String,
}

/// Valuation multiples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationMultiples {
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
}

/// Annual financial series keyed by fiscal year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialTrends {
    pub net_income: BTreeMap<i32, f64>,
    pub revenue: BTreeMap<i32, f64>,
    pub free_cash_flow: BTreeMap<i32, f64>,
}

impl FinancialTrends {
    pub fn is_empty(&self) -> bool {
        self.net_income.is_empty() && self.revenue.is_empty() && self.free_cash_flow.is_empty()
    }
}

/// One daily OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Percent changes over several look-back periods
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub perf_week: Option<f64>,
    pub perf_1m: Option<f64>,
    pub perf_3m: Option<f64>,
    pub perf_6m: Option<f64>,
    pub perf_year: Option<f64>,
    pub perf_ytd: Option<f64>,
    pub volatility_monthly: Option<f64>,
    pub week_high_52: Option<f64>,
    pub week_low_52: Option<f64>,
}

impl PerformanceSnapshot {
    /// One-line summary such as `1-week: +13.7%, 1-month: -9.5%`
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = [
            ("1-week", self.perf_week),
            ("1-month", self.perf_1m),
            ("3-month", self.perf_3m),
            ("6-month", self.perf_6m),
            ("1-year", self.perf_year),
            ("YTD", self.perf_ytd),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .filter(|v| *v != 0.0)
                .map(|v| format!("{label}: {v:+.1}%"))
        })
        .collect();

        if let Some(vol) = self.volatility_monthly.filter(|v| *v != 0.0) {
            parts.push(format!("monthly volatility: {vol:.1}%"));
        }

        parts.join(", ")
    }
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: Option<String>,
    pub published: Option<String>,
}

impl NewsItem {
    /// `[source] title`, or just the title when the source is unknown
    pub fn headline(&self) -> String {
        match self.source.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => format!("[{source}] {}", self.title),
            None => self.title.clone(),
        }
    }
}

/// A black-box upstream returning typed records or "no data"
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &'static [Capability];

    /// Canonical ticker when the source knows the symbol
    async fn lookup_symbol(&self, _symbol: &Symbol) -> Result<Option<Symbol>> {
        Ok(None)
    }

    async fn profile(&self, _symbol: &Symbol) -> Result<Option<StockProfile>> {
        Ok(None)
    }

    async fn valuation(&self, _symbol: &Symbol) -> Result<Option<ValuationMultiples>> {
        Ok(None)
    }

    async fn financial_trends(&self, _symbol: &Symbol) -> Result<Option<FinancialTrends>> {
        Ok(None)
    }

    /// Daily bars covering the last `days` calendar days, oldest first
    async fn daily_history(&self, _symbol: &Symbol, _days: u32) -> Result<Option<Vec<Candle>>> {
        Ok(None)
    }

    async fn performance(&self, _symbol: &Symbol) -> Result<Option<PerformanceSnapshot>> {
        Ok(None)
    }

    async fn news(&self, _symbol: &Symbol, _limit: usize) -> Result<Option<Vec<NewsItem>>> {
        Ok(None)
    }
}

/// Accept `12.5`, `"12.5"`, `"1,234.5"` or `null`
pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

/// Lenient numeric read of a JSON value
pub(crate) fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
