//! Error types for the advisor workflow

use crate::domain::{Dimension, Symbol};
use crate::engine::report::FinalReport;
use advisor_llm::LLMError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by upstream clients and the data layer
#[derive(Debug, Error)]
pub enum StockError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Upstream answered 429
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Upstream call exceeded its deadline
    #[error("{source_name} timed out after {elapsed:?}")]
    Timeout {
        source_name: String,
        elapsed: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for data layer operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Failure of a single specialist, recorded against its dimension
///
/// These never abort the workflow. They end up in `AnalysisState::errors`
/// and as limitation notes in the final report.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DimensionError {
    #[error("insufficient data: {0}")]
    DataUnavailable(String),

    #[error("reasoning failed: {0}")]
    ReasoningFailure(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("specialist crashed: {0}")]
    Crashed(String),

    #[error("slot conflict: {0}")]
    Conflict(String),
}

impl From<LLMError> for DimensionError {
    fn from(err: LLMError) -> Self {
        Self::ReasoningFailure(err.to_string())
    }
}

impl From<StockError> for DimensionError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::TemplateError(e) => Self::ReasoningFailure(e.to_string()),
            other => Self::DataUnavailable(other.to_string()),
        }
    }
}

/// Workflow stage in which a terminal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Analysis,
    Consolidation,
    Persistence,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Analysis => "analysis",
            Self::Consolidation => "consolidation",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Terminal outcomes of one workflow run
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid symbol '{symbol}': {reason}")]
    SymbolInvalid { symbol: String, reason: String },

    #[error("could not validate '{symbol}': {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("no analysis available for {symbol}: all {} specialists failed", errors.len())]
    NoAnalysisAvailable {
        symbol: String,
        errors: BTreeMap<Dimension, DimensionError>,
    },

    /// The report was produced but could not be stored
    #[error("report for {} could not be saved: {source}", report.symbol)]
    PersistenceFailure {
        report: Box<FinalReport>,
        #[source]
        source: StorageError,
    },
}

impl WorkflowError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::SymbolInvalid { .. } | Self::DataUnavailable { .. } => Stage::Validation,
            Self::NoAnalysisAvailable { .. } => Stage::Consolidation,
            Self::PersistenceFailure { .. } => Stage::Persistence,
        }
    }

    /// Report that survived a persistence failure
    pub fn into_report(self) -> Option<FinalReport> {
        match self {
            Self::PersistenceFailure { report, .. } => Some(*report),
            _ => None,
        }
    }
}

/// Report repository failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    TaskFailed(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Misuse of the per-run accumulator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("{0} slot is already filled")]
    SlotAlreadyFilled(Dimension),

    #[error("symbol has not been validated")]
    NotValidated,

    #[error("run is already bound to {0}")]
    SymbolAlreadySet(Symbol),

    #[error("final report already set")]
    ReportAlreadySet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::InvalidSymbol("INVALID".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: INVALID");

        let err = StockError::RateLimitExceeded {
            provider: "dragonfi".to_string(),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded for dragonfi");
    }

    #[test]
    fn test_llm_error_becomes_reasoning_failure() {
        let err: DimensionError = LLMError::RequestFailed("503".to_string()).into();
        assert!(matches!(err, DimensionError::ReasoningFailure(msg) if msg.contains("503")));
    }

    #[test]
    fn test_stock_error_becomes_data_unavailable() {
        let err: DimensionError = StockError::ApiError("boom".to_string()).into();
        assert!(matches!(err, DimensionError::DataUnavailable(_)));
    }

    #[test]
    fn test_workflow_error_stage() {
        let err = WorkflowError::SymbolInvalid {
            symbol: "XYZ".to_string(),
            reason: "unknown".to_string(),
        };
        assert_eq!(err.stage(), Stage::Validation);
        assert!(err.into_report().is_none());

        let err = WorkflowError::NoAnalysisAvailable {
            symbol: "XYZ".to_string(),
            errors: BTreeMap::from([(
                Dimension::Price,
                DimensionError::DataUnavailable("none".to_string()),
            )]),
        };
        assert_eq!(err.stage(), Stage::Consolidation);
        assert!(err.to_string().contains("all 1 specialists failed"));
    }

    #[test]
    fn test_dimension_error_serializes_tagged() {
        let json = serde_json::to_value(DimensionError::Crashed("panic".to_string())).unwrap();
        assert_eq!(json["kind"], "crashed");
        assert_eq!(json["detail"], "panic");
    }
}
