//! Per-run accumulator

use crate::agents::DimensionResult;
use crate::domain::{Dimension, Symbol};
use crate::engine::report::FinalReport;
use crate::error::{DimensionError, StateError};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything one workflow run has learned so far
///
/// Slots are write-once: a dimension that already holds a result or an
/// error rejects a second write. The orchestrator is the only writer; each
/// specialist's output is routed into its own slot.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    run_id: Uuid,
    requested: String,
    symbol: Option<Symbol>,
    results: BTreeMap<Dimension, DimensionResult>,
    errors: BTreeMap<Dimension, DimensionError>,
    final_report: Option<FinalReport>,
}

impl AnalysisState {
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            requested: requested.into(),
            symbol: None,
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            final_report: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Raw input as the caller typed it
    pub fn requested(&self) -> &str {
        &self.requested
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub fn is_validated(&self) -> bool {
        self.symbol.is_some()
    }

    /// Fix the canonical symbol; it cannot change afterwards
    pub fn mark_validated(&mut self, symbol: Symbol) -> Result<(), StateError> {
        match &self.symbol {
            Some(existing) if *existing != symbol => {
                Err(StateError::SymbolAlreadySet(existing.clone()))
            }
            _ => {
                self.symbol = Some(symbol);
                Ok(())
            }
        }
    }

    fn ensure_open(&self, dimension: Dimension) -> Result<(), StateError> {
        if !self.is_validated() {
            return Err(StateError::NotValidated);
        }
        if self.results.contains_key(&dimension) || self.errors.contains_key(&dimension) {
            return Err(StateError::SlotAlreadyFilled(dimension));
        }
        Ok(())
    }

    pub fn record_result(&mut self, result: DimensionResult) -> Result<(), StateError> {
        let dimension = result.dimension();
        self.ensure_open(dimension)?;
        self.results.insert(dimension, result);
        Ok(())
    }

    pub fn record_error(
        &mut self,
        dimension: Dimension,
        error: DimensionError,
    ) -> Result<(), StateError> {
        self.ensure_open(dimension)?;
        self.errors.insert(dimension, error);
        Ok(())
    }

    pub fn result(&self, dimension: Dimension) -> Option<&DimensionResult> {
        self.results.get(&dimension)
    }

    pub fn error(&self, dimension: Dimension) -> Option<&DimensionError> {
        self.errors.get(&dimension)
    }

    pub fn results(&self) -> &BTreeMap<Dimension, DimensionResult> {
        &self.results
    }

    pub fn errors(&self) -> &BTreeMap<Dimension, DimensionError> {
        &self.errors
    }

    pub fn set_final_report(&mut self, report: FinalReport) -> Result<(), StateError> {
        if self.final_report.is_some() {
            return Err(StateError::ReportAlreadySet);
        }
        self.final_report = Some(report);
        Ok(())
    }

    pub fn final_report(&self) -> Option<&FinalReport> {
        self.final_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::price_result;

    fn validated() -> AnalysisState {
        let mut state = AnalysisState::new("tel");
        state.mark_validated(Symbol::parse("TEL").unwrap()).unwrap();
        state
    }

    #[test]
    fn test_slots_are_write_once() {
        let mut state = validated();
        state.record_result(price_result("first")).unwrap();

        assert_eq!(
            state.record_result(price_result("second")),
            Err(StateError::SlotAlreadyFilled(Dimension::Price))
        );
        assert_eq!(
            state.record_error(Dimension::Price, DimensionError::Crashed("late".to_string())),
            Err(StateError::SlotAlreadyFilled(Dimension::Price))
        );
        assert_eq!(state.result(Dimension::Price).unwrap().narrative(), "first");
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_error_slot_blocks_result() {
        let mut state = validated();
        state
            .record_error(Dimension::Price, DimensionError::DataUnavailable("none".to_string()))
            .unwrap();
        assert!(state.record_result(price_result("late")).is_err());
    }

    #[test]
    fn test_writes_require_validation() {
        let mut state = AnalysisState::new("TEL");
        assert_eq!(
            state.record_result(price_result("x")),
            Err(StateError::NotValidated)
        );
    }

    #[test]
    fn test_symbol_is_immutable_once_validated() {
        let mut state = validated();
        assert!(state.mark_validated(Symbol::parse("TEL").unwrap()).is_ok());
        assert!(matches!(
            state.mark_validated(Symbol::parse("SM").unwrap()),
            Err(StateError::SymbolAlreadySet(_))
        ));
        assert_eq!(state.requested(), "tel");
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        assert_ne!(AnalysisState::new("TEL").run_id(), AnalysisState::new("TEL").run_id());
    }
}
