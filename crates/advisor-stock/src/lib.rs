//! Philippine stock advisor
//!
//! Takes a PSE ticker through a fixed workflow and returns a BUY / NOT BUY
//! report:
//!
//! - Validation: normalize the ticker and confirm it is listed
//! - Five independent specialists run concurrently: price, dividend,
//!   price movement, valuation and controversy
//! - Consolidation: merge whatever the specialists produced into one
//!   [`FinalReport`] with an explicit verdict
//!
//! Market data comes from a cascade of upstream sources (DragonFi, PSE
//! EDGE, Yahoo Finance, TradingView). A specialist whose data or reasoning
//! fails is recorded as a limitation instead of failing the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use advisor_stock::{Advisor, AdvisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AdvisorConfig::from_env()?;
//!     let advisor = Advisor::from_config(&config)?;
//!
//!     let saved = advisor.analyze_and_save("TEL").await?;
//!     println!("{}: {}", saved.report.symbol, saved.report.verdict);
//!     Ok(())
//! }
//! ```

pub mod advisor;
pub mod agents;
pub mod api;
pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod export;
pub mod prompts;
pub mod reasoning;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use advisor::{Advisor, SavedReport};
pub use agents::{DimensionResult, Signal, SignalKind, Specialist};
pub use api::MarketDataSource;
pub use config::{AdvisorConfig, StorageBackend, Thresholds};
pub use domain::{Dimension, Symbol, Verdict};
pub use engine::{
    AnalysisState, FinalReport, Orchestrator, ProgressListener, VerdictBasis, WorkflowEvent,
};
pub use error::{DimensionError, Result, Stage, StockError, StorageError, WorkflowError};
pub use reasoning::{Prompt, ReasoningBackend};
pub use storage::{MemoryReportRepository, ReportRepository, SqliteReportRepository, StoredReport};
