//! TradingView scanner client
//!
//! Multi-period performance and volatility that DragonFi does not expose.

use super::http::RateLimitedClient;
use super::{Capability, MarketDataSource, PerformanceSnapshot, value_as_f64};
use crate::domain::Symbol;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

const SOURCE: &str = "tradingview";

const CAPABILITIES: &[Capability] = &[Capability::Performance];

const COLUMNS: &[&str] = &[
    "Perf.W",
    "Perf.1M",
    "Perf.3M",
    "Perf.6M",
    "Perf.Y",
    "Perf.YTD",
    "Volatility.M",
    "price_52_week_high",
    "price_52_week_low",
];

#[derive(Debug, Default, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    #[serde(default)]
    d: Vec<serde_json::Value>,
}

/// TradingView scanner client
pub struct TradingViewClient {
    http: RateLimitedClient,
    scanner_url: String,
}

impl TradingViewClient {
    pub fn new(
        scanner_url: impl Into<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self> {
        Ok(Self {
            http: RateLimitedClient::new(SOURCE, timeout, requests_per_minute)?,
            scanner_url: scanner_url.into(),
        })
    }
}

#[async_trait]
impl MarketDataSource for TradingViewClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn performance(&self, symbol: &Symbol) -> Result<Option<PerformanceSnapshot>> {
        let body = json!({
            "symbols": {"tickers": [format!("PSE:{symbol}")]},
            "columns": COLUMNS,
        });

        let response: Option<ScanResponse> = self
            .http
            .post_json(&self.scanner_url, &body, HeaderMap::new())
            .await?;

        Ok(response
            .and_then(|r| r.data.into_iter().next())
            .and_then(|row| snapshot_from_row(&row.d)))
    }
}

fn snapshot_from_row(values: &[serde_json::Value]) -> Option<PerformanceSnapshot> {
    let at = |i: usize| values.get(i).and_then(value_as_f64);

    let snapshot = PerformanceSnapshot {
        perf_week: at(0),
        perf_1m: at(1),
        perf_3m: at(2),
        perf_6m: at(3),
        perf_year: at(4),
        perf_ytd: at(5),
        volatility_monthly: at(6),
        week_high_52: at(7),
        week_low_52: at(8),
    };

    (snapshot != PerformanceSnapshot::default()).then_some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_row() {
        let response: ScanResponse = serde_json::from_value(json!({
            "data": [{"s": "PSE:TEL", "d": [1.5, -9.5, null, 3.2, -12.0, 4.0, 2.1, 1500, 1200]}]
        }))
        .unwrap();

        let snapshot = snapshot_from_row(&response.data[0].d).unwrap();
        assert_eq!(snapshot.perf_1m, Some(-9.5));
        assert_eq!(snapshot.perf_3m, None);
        assert_eq!(snapshot.perf_year, Some(-12.0));
        assert_eq!(snapshot.week_low_52, Some(1200.0));
    }

    #[test]
    fn test_empty_row_is_no_data() {
        assert!(snapshot_from_row(&[]).is_none());
        assert!(snapshot_from_row(&[serde_json::Value::Null]).is_none());
    }
}
