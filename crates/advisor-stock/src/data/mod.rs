//! Data service layer
//!
//! [`MarketData`] fans one request across the configured sources in order
//! and returns the first populated answer. Per-dimension services build
//! typed records on top of it and signal [`DimensionError::DataUnavailable`]
//! instead of failing when nothing usable came back.
//!
//! [`DimensionError::DataUnavailable`]: crate::error::DimensionError::DataUnavailable

pub mod candlestick;
pub mod controversy;
pub mod dividend;
pub mod indicators;
pub mod movement;
pub mod price;
pub mod valuation;

pub use controversy::ControversyData;
pub use dividend::DividendData;
pub use movement::MovementData;
pub use price::PriceData;
pub use valuation::ValuationData;

use crate::api::{
    Candle, Capability, FinancialTrends, MarketDataSource, NewsItem, PerformanceSnapshot,
    StockProfile, ValuationMultiples,
};
use crate::domain::Symbol;
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a symbol directory lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Symbol),
    /// At least one source answered and none knew the symbol
    NotFound,
    /// No source could be asked
    Unreachable(String),
}

/// Ordered set of upstream sources with a per-call deadline
#[derive(Clone)]
pub struct MarketData {
    sources: Vec<Arc<dyn MarketDataSource>>,
    call_timeout: Duration,
    history_days: u32,
    news_limit: usize,
}

impl MarketData {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>, call_timeout: Duration) -> Self {
        Self {
            sources,
            call_timeout,
            history_days: 365,
            news_limit: 5,
        }
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    pub fn with_news_limit(mut self, limit: usize) -> Self {
        self.news_limit = limit;
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn supporting(
        &self,
        capability: Capability,
    ) -> impl Iterator<Item = &Arc<dyn MarketDataSource>> {
        self.sources
            .iter()
            .filter(move |s| s.capabilities().contains(&capability))
    }

    async fn call<T, Fut>(&self, source: &str, fut: Fut) -> Result<Option<T>>
    where
        Fut: Future<Output = Result<Option<T>>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(crate::error::StockError::Timeout {
                source_name: source.to_string(),
                elapsed: self.call_timeout,
            }),
        }
    }

    /// First `Some` across the sources offering `capability`
    ///
    /// Errors and timeouts are logged and treated like "no data".
    async fn cascade<T, F, Fut>(
        &self,
        capability: Capability,
        symbol: &Symbol,
        fetch: F,
    ) -> Option<T>
    where
        F: Fn(Arc<dyn MarketDataSource>, Symbol) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for source in self.supporting(capability) {
            let name = source.name();
            match self.call(name, fetch(Arc::clone(source), symbol.clone())).await {
                Ok(Some(value)) => {
                    tracing::debug!(%symbol, source = name, ?capability, "data found");
                    return Some(value);
                }
                Ok(None) => {
                    tracing::debug!(
                        %symbol,
                        source = name,
                        ?capability,
                        "no data, trying next source"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        %symbol,
                        source = name,
                        ?capability,
                        error = %e,
                        "source failed, trying next"
                    );
                }
            }
        }
        None
    }

    /// Ask every lookup-capable source until one recognizes the symbol
    pub async fn lookup_symbol(&self, symbol: &Symbol) -> LookupOutcome {
        let mut answered = false;
        let mut failures = Vec::new();

        for source in self.supporting(Capability::Lookup) {
            let name = source.name();
            match self.call(name, source.lookup_symbol(symbol)).await {
                Ok(Some(found)) => return LookupOutcome::Found(found),
                Ok(None) => answered = true,
                Err(e) => {
                    tracing::warn!(%symbol, source = name, error = %e, "symbol lookup failed");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if answered {
            LookupOutcome::NotFound
        } else if failures.is_empty() {
            LookupOutcome::Unreachable("no source offers symbol lookup".to_string())
        } else {
            LookupOutcome::Unreachable(failures.join("; "))
        }
    }

    pub async fn profile(&self, symbol: &Symbol) -> Option<StockProfile> {
        self.cascade(Capability::Profile, symbol, |s, sym| async move { s.profile(&sym).await })
            .await
    }

    pub async fn valuation(&self, symbol: &Symbol) -> Option<ValuationMultiples> {
        self.cascade(Capability::Valuation, symbol, |s, sym| async move {
            s.valuation(&sym).await
        })
        .await
    }

    pub async fn financial_trends(&self, symbol: &Symbol) -> Option<FinancialTrends> {
        self.cascade(Capability::FinancialTrends, symbol, |s, sym| async move {
            s.financial_trends(&sym).await
        })
        .await
    }

    pub async fn daily_history(&self, symbol: &Symbol) -> Option<Vec<Candle>> {
        let days = self.history_days;
        self.cascade(Capability::DailyHistory, symbol, |s, sym| async move {
            s.daily_history(&sym, days).await
        })
        .await
    }

    pub async fn performance(&self, symbol: &Symbol) -> Option<PerformanceSnapshot> {
        self.cascade(Capability::Performance, symbol, |s, sym| async move {
            s.performance(&sym).await
        })
        .await
    }

    pub async fn news(&self, symbol: &Symbol) -> Option<Vec<NewsItem>> {
        let limit = self.news_limit;
        self.cascade(Capability::News, symbol, |s, sym| async move { s.news(&sym, limit).await })
            .await
    }
}

impl std::fmt::Debug for MarketData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketData")
            .field("sources", &self.source_names())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketDataSource;
    use crate::error::StockError;

    fn symbol() -> Symbol {
        Symbol::parse("TEL").unwrap()
    }

    fn profile(price: f64) -> StockProfile {
        StockProfile {
            symbol: "TEL".to_string(),
            price,
            currency: "PHP".to_string(),
            ..Default::default()
        }
    }

    fn mock(name: &'static str, caps: &'static [Capability]) -> MockMarketDataSource {
        let mut source = MockMarketDataSource::new();
        source.expect_name().return_const(name);
        source.expect_capabilities().return_const(caps);
        source
    }

    #[tokio::test]
    async fn test_cascade_falls_through_errors_and_empty_answers() {
        let mut failing = mock("primary", &[Capability::Profile]);
        failing
            .expect_profile()
            .times(1)
            .returning(|_| Err(StockError::ApiError("503".to_string())));

        let mut empty = mock("secondary", &[Capability::Profile]);
        empty.expect_profile().times(1).returning(|_| Ok(None));

        let mut good = mock("tertiary", &[Capability::Profile]);
        good.expect_profile().times(1).returning(|_| Ok(Some(profile(1_350.0))));

        let mut unused = mock("never", &[Capability::Profile]);
        unused.expect_profile().times(0);

        let data = MarketData::new(
            vec![Arc::new(failing), Arc::new(empty), Arc::new(good), Arc::new(unused)],
            Duration::from_secs(1),
        );

        assert_eq!(data.profile(&symbol()).await.map(|p| p.price), Some(1_350.0));
    }

    #[tokio::test]
    async fn test_cascade_skips_sources_without_capability() {
        let mut history_only = mock("history", &[Capability::DailyHistory]);
        history_only.expect_profile().times(0);

        let data = MarketData::new(vec![Arc::new(history_only)], Duration::from_secs(1));
        assert!(data.profile(&symbol()).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_outcomes() {
        let mut unknown = mock("directory", &[Capability::Lookup]);
        unknown.expect_lookup_symbol().returning(|_| Ok(None));
        let data = MarketData::new(vec![Arc::new(unknown)], Duration::from_secs(1));
        assert_eq!(data.lookup_symbol(&symbol()).await, LookupOutcome::NotFound);

        let mut down = mock("directory", &[Capability::Lookup]);
        down.expect_lookup_symbol()
            .returning(|_| Err(StockError::ApiError("connection refused".to_string())));
        let data = MarketData::new(vec![Arc::new(down)], Duration::from_secs(1));
        assert!(matches!(
            data.lookup_symbol(&symbol()).await,
            LookupOutcome::Unreachable(reason) if reason.contains("connection refused")
        ));

        let mut down = mock("primary", &[Capability::Lookup]);
        down.expect_lookup_symbol()
            .returning(|_| Err(StockError::ApiError("timeout".to_string())));
        let mut known = mock("secondary", &[Capability::Lookup]);
        known.expect_lookup_symbol().returning(|s| Ok(Some(s.clone())));
        let data = MarketData::new(vec![Arc::new(down), Arc::new(known)], Duration::from_secs(1));
        assert_eq!(data.lookup_symbol(&symbol()).await, LookupOutcome::Found(symbol()));
    }

    #[tokio::test]
    async fn test_lookup_without_sources_is_unreachable() {
        let data = MarketData::new(Vec::new(), Duration::from_secs(1));
        assert!(matches!(data.lookup_symbol(&symbol()).await, LookupOutcome::Unreachable(_)));
    }
}
