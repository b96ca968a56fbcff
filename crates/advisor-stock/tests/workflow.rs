//! End-to-end workflow runs against in-process fakes

use advisor_llm::LLMError;
use advisor_stock::api::{
    Candle, Capability, FinancialTrends, NewsItem, PerformanceSnapshot, StockProfile,
    ValuationMultiples,
};
use advisor_stock::data::MarketData;
use advisor_stock::engine::ChannelListener;
use advisor_stock::storage::{RecentSymbol, ReportId};
use advisor_stock::{
    Advisor, AdvisorConfig, Dimension, FinalReport, MarketDataSource, MemoryReportRepository,
    Prompt, ReasoningBackend, ReportRepository, StorageError, StoredReport, Symbol, Verdict,
    WorkflowError, WorkflowEvent,
};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const ALL: &[Capability] = &[
    Capability::Lookup,
    Capability::Profile,
    Capability::Valuation,
    Capability::FinancialTrends,
    Capability::DailyHistory,
    Capability::Performance,
    Capability::News,
];

/// Deterministic market data for a handful of tickers
struct FakeExchange;

impl FakeExchange {
    fn base_price(symbol: &Symbol) -> Option<f64> {
        match symbol.as_str() {
            "TEL" => Some(1_300.0),
            "SM" => Some(900.0),
            "AREIT" => Some(38.0),
            _ => None,
        }
    }

    fn candles(base: f64) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        (0..250u32)
            .map(|i| {
                let drift = 1.0 + f64::from(i) * 0.0008;
                let wiggle = if i % 2 == 0 { 1.004 } else { 0.996 };
                let close = base * drift * wiggle;
                Candle {
                    date: start.checked_add_days(Days::new(u64::from(i))).unwrap(),
                    open: close * 0.998,
                    high: close * 1.006,
                    low: close * 0.994,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for FakeExchange {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn capabilities(&self) -> &'static [Capability] {
        ALL
    }

    async fn lookup_symbol(&self, symbol: &Symbol) -> advisor_stock::Result<Option<Symbol>> {
        Ok(Self::base_price(symbol).map(|_| symbol.clone()))
    }

    async fn profile(&self, symbol: &Symbol) -> advisor_stock::Result<Option<StockProfile>> {
        Ok(Self::base_price(symbol).map(|price| StockProfile {
            symbol: symbol.to_string(),
            company_name: Some(format!("{symbol} Holdings")),
            price: price * 1.2,
            previous_close: Some(price * 1.19),
            week_high_52: Some(price * 1.3),
            week_low_52: Some(price * 0.95),
            dividend_yield_pct: Some(5.5),
            shares_outstanding: Some(200_000_000.0),
            is_reit: symbol.as_str() == "AREIT",
            currency: "PHP".to_string(),
        }))
    }

    async fn valuation(&self, symbol: &Symbol) -> advisor_stock::Result<Option<ValuationMultiples>> {
        Ok(Self::base_price(symbol).map(|_| ValuationMultiples {
            pe_ratio: Some(9.5),
            pb_ratio: Some(1.4),
            ..ValuationMultiples::default()
        }))
    }

    async fn financial_trends(&self, symbol: &Symbol) -> advisor_stock::Result<Option<FinancialTrends>> {
        Ok(Self::base_price(symbol).map(|_| FinancialTrends {
            net_income: BTreeMap::from([(2023, 20.0e9), (2024, 24.0e9)]),
            revenue: BTreeMap::from([(2023, 200.0e9), (2024, 210.0e9)]),
            free_cash_flow: BTreeMap::from([(2023, 15.0e9), (2024, 18.0e9)]),
        }))
    }

    async fn daily_history(&self, symbol: &Symbol, _days: u32) -> advisor_stock::Result<Option<Vec<Candle>>> {
        Ok(Self::base_price(symbol).map(Self::candles))
    }

    async fn performance(&self, symbol: &Symbol) -> advisor_stock::Result<Option<PerformanceSnapshot>> {
        Ok(Self::base_price(symbol).map(|_| PerformanceSnapshot {
            perf_1m: Some(2.5),
            perf_year: Some(20.0),
            ..PerformanceSnapshot::default()
        }))
    }

    async fn news(&self, symbol: &Symbol, _limit: usize) -> advisor_stock::Result<Option<Vec<NewsItem>>> {
        Ok(Some(vec![NewsItem {
            title: format!("{symbol} declares cash dividend"),
            source: Some("BusinessWorld".to_string()),
            published: None,
        }]))
    }
}

/// Echoes the first prompt line for specialists and states a verdict for
/// the consolidation prompt
#[derive(Default)]
struct ScriptedBackend {
    calls: AtomicUsize,
    failing: HashSet<&'static str>,
}

impl ScriptedBackend {
    fn failing(names: &[&'static str]) -> Self {
        Self {
            failing: names.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(prompt.name) {
            return Err(LLMError::RequestFailed(format!("{} backend down", prompt.name)));
        }

        if prompt.name == "consolidation" {
            let verdict = if prompt.text.contains("Data limitation") {
                "NOT BUY"
            } else {
                "BUY"
            };
            return Ok(format!("Executive summary.\n\n**Verdict: {verdict}**\nBecause the data says so."));
        }

        Ok(prompt.text.lines().next().unwrap_or_default().to_string())
    }
}

/// Accepts nothing
struct BrokenRepository;

#[async_trait]
impl ReportRepository for BrokenRepository {
    async fn save(&self, _report: &FinalReport) -> Result<ReportId, StorageError> {
        Err(StorageError::LockPoisoned)
    }

    async fn get_latest(&self, _symbol: &Symbol) -> Result<Option<StoredReport>, StorageError> {
        Ok(None)
    }

    async fn get_by_id(&self, _symbol: &Symbol, _id: ReportId) -> Result<Option<StoredReport>, StorageError> {
        Ok(None)
    }

    async fn list_history(&self, _symbol: &Symbol, _limit: usize) -> Result<Vec<StoredReport>, StorageError> {
        Ok(Vec::new())
    }

    async fn list_recent_symbols(&self, _limit: usize) -> Result<Vec<RecentSymbol>, StorageError> {
        Ok(Vec::new())
    }
}

fn market() -> MarketData {
    MarketData::new(vec![Arc::new(FakeExchange)], Duration::from_secs(5))
}

fn advisor_with(backend: Arc<ScriptedBackend>, repository: Arc<dyn ReportRepository>) -> Advisor {
    Advisor::from_parts(market(), backend, repository, &AdvisorConfig::default()).unwrap()
}

#[tokio::test]
async fn full_run_fills_every_section() {
    let backend = Arc::new(ScriptedBackend::default());
    let repository = Arc::new(MemoryReportRepository::new());
    let advisor = advisor_with(Arc::clone(&backend), repository.clone());

    let saved = advisor.analyze_and_save("tel").await.unwrap();
    let report = &saved.report;

    assert_eq!(report.symbol.as_str(), "TEL");
    assert_eq!(report.verdict, Verdict::Buy);
    assert!(report.is_complete());
    assert!(report.limitations.is_empty());
    // five specialists and one consolidation
    assert_eq!(backend.calls(), 6);

    let stored = repository.get_latest(&report.symbol).await.unwrap().unwrap();
    assert_eq!(stored.id, saved.id);
    assert_eq!(&stored.report, report);
}

#[tokio::test]
async fn invalid_symbol_never_reaches_the_backend() {
    let backend = Arc::new(ScriptedBackend::default());
    let repository = Arc::new(MemoryReportRepository::new());
    let advisor = advisor_with(Arc::clone(&backend), repository.clone());

    for raw in ["ZZZZ", "TEL; DROP", ""] {
        let err = advisor.analyze_and_save(raw).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SymbolInvalid { .. }), "{raw:?} -> {err:?}");
    }
    assert_eq!(backend.calls(), 0);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn one_failed_specialist_leaves_a_limitation() {
    let backend = Arc::new(ScriptedBackend::failing(&["dividend"]));
    let advisor = advisor_with(backend, Arc::new(MemoryReportRepository::new()));

    let report = advisor.analyze("TEL").await.unwrap();

    assert_eq!(report.sections.len(), 4);
    assert_eq!(report.missing_dimensions(), vec![Dimension::Dividend]);
    assert_eq!(report.limitations.len(), 1);
    assert!(report.limitations[0].contains("Dividend Analysis"));
    assert!(report.limitations[0].contains("reasoning failed"));
    assert_eq!(report.verdict, Verdict::NotBuy);
}

#[tokio::test]
async fn all_specialists_failing_persists_nothing() {
    let backend = Arc::new(ScriptedBackend::failing(&[
        "price",
        "dividend",
        "movement",
        "valuation",
        "controversy",
    ]));
    let repository = Arc::new(MemoryReportRepository::new());
    let advisor = advisor_with(Arc::clone(&backend), repository.clone());

    let err = advisor.analyze_and_save("SM").await.unwrap_err();

    assert!(matches!(err, WorkflowError::NoAnalysisAvailable { ref errors, .. } if errors.len() == 5));
    assert_eq!(backend.calls(), 5);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn consolidation_outage_still_produces_a_report() {
    let backend = Arc::new(ScriptedBackend::failing(&["consolidation"]));
    let advisor = advisor_with(backend, Arc::new(MemoryReportRepository::new()));

    let report = advisor.analyze("TEL").await.unwrap();

    assert!(report.is_complete());
    assert!(report.summary.starts_with("Automated summary for TEL."));
    assert_eq!(report.verdict_basis, advisor_stock::VerdictBasis::Signals);
}

#[tokio::test]
async fn identical_inputs_give_identical_verdicts() {
    let advisor = advisor_with(
        Arc::new(ScriptedBackend::default()),
        Arc::new(MemoryReportRepository::new()),
    );

    let first = advisor.analyze("AREIT").await.unwrap();
    let second = advisor.analyze("AREIT").await.unwrap();

    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.sections, second.sections);
}

#[tokio::test]
async fn concurrent_runs_do_not_leak() {
    let advisor = advisor_with(
        Arc::new(ScriptedBackend::default()),
        Arc::new(MemoryReportRepository::new()),
    );

    let (tel, sm) = tokio::join!(advisor.analyze("TEL"), advisor.analyze("SM"));
    let (tel, sm) = (tel.unwrap(), sm.unwrap());

    assert_eq!(tel.symbol.as_str(), "TEL");
    assert_eq!(sm.symbol.as_str(), "SM");
    for narrative in tel.sections.values() {
        assert!(narrative.contains("**TEL**") && !narrative.contains("**SM**"), "{narrative}");
    }
    for narrative in sm.sections.values() {
        assert!(narrative.contains("**SM**") && !narrative.contains("**TEL**"), "{narrative}");
    }
}

#[tokio::test]
async fn persistence_failure_hands_back_the_report() {
    let advisor = advisor_with(Arc::new(ScriptedBackend::default()), Arc::new(BrokenRepository));

    let err = advisor.analyze_and_save("TEL").await.unwrap_err();
    assert_eq!(err.stage(), advisor_stock::Stage::Persistence);

    let report = err.into_report().unwrap();
    assert_eq!(report.symbol.as_str(), "TEL");
    assert!(report.is_complete());
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let (listener, mut rx) = ChannelListener::new();
    let advisor = advisor_with(
        Arc::new(ScriptedBackend::failing(&["controversy"])),
        Arc::new(MemoryReportRepository::new()),
    )
    .with_listener(Arc::new(listener));

    advisor.analyze("TEL").await.unwrap();

    let mut completed = 0;
    let mut failed = Vec::new();
    let mut verdict = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            WorkflowEvent::SpecialistCompleted { .. } => completed += 1,
            WorkflowEvent::SpecialistFailed { dimension, .. } => failed.push(dimension),
            WorkflowEvent::VerdictReached { verdict: v, .. } => verdict = Some(v),
            _ => {}
        }
    }
    assert_eq!(completed, 4);
    assert_eq!(failed, vec![Dimension::Controversy]);
    assert_eq!(verdict, Some(Verdict::NotBuy));
}
