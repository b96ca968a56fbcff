//! Specialists, the symbol validator and the consolidator
//!
//! Each specialist owns one [`Dimension`]: it pulls that dimension's data,
//! derives deterministic [`Signal`]s from it, and asks the reasoning backend
//! for a short narrative. Specialists never see each other's output.

pub mod consolidator;
pub mod controversy;
pub mod dividend;
pub mod movement;
pub mod price;
pub mod validator;
pub mod valuation;

pub use consolidator::Consolidator;
pub use controversy::ControversySpecialist;
pub use dividend::DividendSpecialist;
pub use movement::MovementSpecialist;
pub use price::PriceSpecialist;
pub use validator::SymbolValidator;
pub use valuation::ValuationSpecialist;

use crate::config::Thresholds;
use crate::data::{
    ControversyData, DividendData, MarketData, MovementData, PriceData, ValuationData,
};
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use crate::prompts::PromptLibrary;
use crate::reasoning::ReasoningBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Opportunity,
    Risk,
}

/// A rule-derived observation the fallback scorer can count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub label: String,
}

impl Signal {
    pub fn opportunity(label: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Opportunity,
            label: label.into(),
        }
    }

    pub fn risk(label: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Risk,
            label: label.into(),
        }
    }
}

/// Typed data plus the narrative written about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding<T> {
    pub data: T,
    pub narrative: String,
    pub signals: Vec<Signal>,
}

/// Output of one specialist, tagged by dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum DimensionResult {
    Price(Finding<PriceData>),
    Dividend(Finding<DividendData>),
    Movement(Finding<MovementData>),
    Valuation(Finding<ValuationData>),
    Controversy(Finding<ControversyData>),
}

impl DimensionResult {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Price(_) => Dimension::Price,
            Self::Dividend(_) => Dimension::Dividend,
            Self::Movement(_) => Dimension::Movement,
            Self::Valuation(_) => Dimension::Valuation,
            Self::Controversy(_) => Dimension::Controversy,
        }
    }

    pub fn narrative(&self) -> &str {
        match self {
            Self::Price(f) => &f.narrative,
            Self::Dividend(f) => &f.narrative,
            Self::Movement(f) => &f.narrative,
            Self::Valuation(f) => &f.narrative,
            Self::Controversy(f) => &f.narrative,
        }
    }

    pub fn signals(&self) -> &[Signal] {
        match self {
            Self::Price(f) => &f.signals,
            Self::Dividend(f) => &f.signals,
            Self::Movement(f) => &f.signals,
            Self::Valuation(f) => &f.signals,
            Self::Controversy(f) => &f.signals,
        }
    }
}

/// One independent analysis unit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Specialist: Send + Sync {
    fn dimension(&self) -> Dimension;

    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError>;
}

/// What every specialist needs, built once and shared
pub struct SpecialistDeps {
    pub data: MarketData,
    pub reasoning: Arc<dyn ReasoningBackend>,
    pub prompts: Arc<PromptLibrary>,
    pub thresholds: Thresholds,
}

impl SpecialistDeps {
    /// Render the dimension's prompt and ask the backend for a narrative
    pub(crate) async fn narrate<S: Serialize + Send>(
        &self,
        dimension: Dimension,
        symbol: &Symbol,
        data_text: &str,
        extra: S,
    ) -> Result<String, DimensionError> {
        let prompt = self
            .prompts
            .specialist(dimension, symbol, data_text, extra)
            .map_err(|e| DimensionError::ReasoningFailure(e.to_string()))?;
        Ok(self.reasoning.complete(&prompt).await?)
    }
}

impl std::fmt::Debug for SpecialistDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistDeps")
            .field("data", &self.data)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}

/// The five specialists in report order
pub fn default_specialists(deps: &Arc<SpecialistDeps>) -> Vec<Arc<dyn Specialist>> {
    vec![
        Arc::new(PriceSpecialist::new(Arc::clone(deps))),
        Arc::new(DividendSpecialist::new(Arc::clone(deps))),
        Arc::new(MovementSpecialist::new(Arc::clone(deps))),
        Arc::new(ValuationSpecialist::new(Arc::clone(deps))),
        Arc::new(ControversySpecialist::new(Arc::clone(deps))),
    ]
}

pub(crate) fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}{suffix}"))
}

pub(crate) fn fmt_peso(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("₱{v:.2}"))
}

pub(crate) fn bullet_list(title: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = format!("{title}:\n");
    for line in lines {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
