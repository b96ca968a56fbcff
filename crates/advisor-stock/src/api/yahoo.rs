//! Yahoo Finance client for the `SYMBOL.PS` listings
//!
//! Used as a fallback for daily history and for a price snapshot derived
//! from that history when DragonFi has no profile.

use super::{Candle, Capability, MarketDataSource, StockProfile};
use crate::domain::Symbol;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use time::OffsetDateTime;
use tracing::instrument;
use yahoo_finance_api as yahoo;

const SOURCE: &str = "yahoo";

const CAPABILITIES: &[Capability] = &[Capability::Profile, Capability::DailyHistory];

/// Yahoo Finance API client
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self {}
    }

    fn connector() -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| StockError::YahooFinanceError(e.to_string()))
    }

    async fn history_between(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let provider = Self::connector()?;

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(&symbol.yahoo_ticker(), start_odt, end_odt)
            .await
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let secs = i64::try_from(q.timestamp).ok()?;
                let date = DateTime::from_timestamp(secs, 0)?.date_naive();
                (q.close > 0.0).then_some(Candle {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume as f64,
                })
            })
            .collect())
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn profile(&self, symbol: &Symbol) -> Result<Option<StockProfile>> {
        let end = Utc::now();
        let candles = self
            .history_between(symbol, end - ChronoDuration::days(365), end)
            .await?;
        Ok(profile_from_history(symbol, &candles))
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn daily_history(&self, symbol: &Symbol, days: u32) -> Result<Option<Vec<Candle>>> {
        let end = Utc::now();
        let candles = self
            .history_between(symbol, end - ChronoDuration::days(i64::from(days)), end)
            .await?;
        Ok((!candles.is_empty()).then_some(candles))
    }
}

/// Price snapshot from a year of daily bars
fn profile_from_history(symbol: &Symbol, candles: &[Candle]) -> Option<StockProfile> {
    let last = candles.last()?;
    let previous_close = candles.len().checked_sub(2).map(|i| candles[i].close);
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    Some(StockProfile {
        symbol: symbol.to_string(),
        company_name: None,
        price: last.close,
        previous_close,
        week_high_52: (high > 0.0).then_some(high),
        week_low_52: (low > 0.0 && low < f64::MAX).then_some(low),
        dividend_yield_pct: None,
        shares_outstanding: None,
        is_reit: false,
        currency: "PHP".to_string(),
    })
}
