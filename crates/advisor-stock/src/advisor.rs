//! Entry point wiring configuration into a ready workflow

use crate::agents::{Consolidator, SpecialistDeps, SymbolValidator, default_specialists};
use crate::api::{
    DragonFiClient, MarketDataSource, PseEdgeClient, TradingViewClient, YahooFinanceClient,
};
use crate::config::AdvisorConfig;
use crate::data::MarketData;
use crate::engine::{FinalReport, Orchestrator, ProgressListener};
use crate::error::{Result, StockError, WorkflowError};
use crate::prompts::PromptLibrary;
use crate::reasoning::{LlmReasoner, ReasoningBackend};
use crate::storage::{ReportId, ReportRepository, open_repository};
use std::sync::Arc;
use tracing::instrument;

/// A report together with the id it was stored under
#[derive(Debug, Clone, PartialEq)]
pub struct SavedReport {
    pub id: ReportId,
    pub report: FinalReport,
}

/// Upstream sources in cascade order
pub fn market_data(config: &AdvisorConfig) -> Result<MarketData> {
    let rpm = config.requests_per_minute;
    let timeout = config.request_timeout;
    let endpoints = &config.endpoints;

    let sources: Vec<Arc<dyn MarketDataSource>> = vec![
        Arc::new(DragonFiClient::new(
            endpoints.dragonfi_base_url.clone(),
            timeout,
            rpm,
            config.cache_ttl_directory,
            config.cache_ttl_profile,
        )?),
        Arc::new(PseEdgeClient::new(endpoints.pse_edge_base_url.clone(), timeout, rpm)?),
        Arc::new(YahooFinanceClient::new()),
        Arc::new(TradingViewClient::new(
            endpoints.tradingview_scanner_url.clone(),
            timeout,
            rpm,
        )?),
    ];

    Ok(MarketData::new(sources, timeout)
        .with_history_days(config.history_days)
        .with_news_limit(config.news_limit))
}

/// Validated, analysed and optionally persisted reports for PSE tickers
pub struct Advisor {
    orchestrator: Orchestrator,
    repository: Arc<dyn ReportRepository>,
}

impl Advisor {
    /// Live upstreams, the configured LLM provider and report store
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let data = market_data(config)?;
        let reasoner =
            LlmReasoner::from_settings(&config.llm, config.consolidation_timeout.as_secs())?;
        tracing::info!(
            provider = reasoner.provider_name(),
            model = %config.llm.model,
            sources = ?data.source_names(),
            "advisor configured"
        );

        let repository = open_repository(config.storage_backend, &config.sqlite_path)
            .map_err(|e| StockError::ConfigError(format!("cannot open report store: {e}")))?;

        Self::from_parts(data, Arc::new(reasoner), repository, config)
    }

    /// Assemble from already-built collaborators
    pub fn from_parts(
        data: MarketData,
        reasoning: Arc<dyn ReasoningBackend>,
        repository: Arc<dyn ReportRepository>,
        config: &AdvisorConfig,
    ) -> Result<Self> {
        let prompts = Arc::new(PromptLibrary::new()?);
        let deps = Arc::new(SpecialistDeps {
            data: data.clone(),
            reasoning: Arc::clone(&reasoning),
            prompts: Arc::clone(&prompts),
            thresholds: config.thresholds.clone(),
        });

        let orchestrator = Orchestrator::new(
            SymbolValidator::new(data),
            default_specialists(&deps),
            Consolidator::new(reasoning, prompts, config.consolidation_timeout),
            config.specialist_timeout,
        )?;

        Ok(Self {
            orchestrator,
            repository,
        })
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.orchestrator = self.orchestrator.with_listener(listener);
        self
    }

    pub fn repository(&self) -> Arc<dyn ReportRepository> {
        Arc::clone(&self.repository)
    }

    /// Run the workflow without persisting
    pub async fn analyze(&self, raw: &str) -> std::result::Result<FinalReport, WorkflowError> {
        self.orchestrator.run(raw).await
    }

    /// Run the workflow and store the report
    ///
    /// A storage failure surfaces as [`WorkflowError::PersistenceFailure`],
    /// which still carries the report.
    #[instrument(skip(self))]
    pub async fn analyze_and_save(
        &self,
        raw: &str,
    ) -> std::result::Result<SavedReport, WorkflowError> {
        let report = self.orchestrator.run(raw).await?;
        match self.repository.save(&report).await {
            Ok(id) => Ok(SavedReport { id, report }),
            Err(source) => {
                tracing::error!(
                    symbol = %report.symbol,
                    error = %source,
                    "report could not be saved"
                );
                Err(WorkflowError::PersistenceFailure {
                    report: Box::new(report),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for Advisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advisor")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
