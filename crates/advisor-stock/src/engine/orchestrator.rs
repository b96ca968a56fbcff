//! Validation, parallel specialists, consolidation

use super::progress::{NoopListener, ProgressListener, WorkflowEvent};
use super::report::FinalReport;
use super::state::AnalysisState;
use crate::agents::{Consolidator, DimensionResult, Specialist, SymbolValidator};
use crate::domain::{Dimension, Symbol};
use crate::error::{DimensionError, Stage, StockError, WorkflowError};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, instrument};

/// Where a run currently is
///
/// `Start → Validating → {Failed | Analyzing} → Consolidating → {Done | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Start,
    Validating,
    Analyzing,
    Consolidating,
    Done,
    Failed,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Validating => "validating",
            Self::Analyzing => "analyzing",
            Self::Consolidating => "consolidating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Validating)
                | (Self::Validating, Self::Failed | Self::Analyzing)
                | (Self::Analyzing, Self::Consolidating)
                | (Self::Consolidating, Self::Done | Self::Failed)
        )
    }
}

/// Runs one symbol through the whole workflow
///
/// Holds no per-run state: every call builds a fresh [`AnalysisState`], so
/// one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    validator: SymbolValidator,
    specialists: Vec<Arc<dyn Specialist>>,
    consolidator: Consolidator,
    specialist_timeout: Duration,
    listener: Arc<dyn ProgressListener>,
}

struct Run<'a> {
    phase: WorkflowPhase,
    state: &'a mut AnalysisState,
}

impl Run<'_> {
    fn advance(&mut self, next: WorkflowPhase) {
        debug_assert!(self.phase.can_advance_to(next), "{:?} -> {next:?}", self.phase);
        tracing::debug!(
            run_id = %self.state.run_id(),
            from = self.phase.as_str(),
            to = next.as_str(),
            "phase"
        );
        self.phase = next;
    }
}

impl Orchestrator {
    /// Rejects two specialists claiming the same dimension
    pub fn new(
        validator: SymbolValidator,
        specialists: Vec<Arc<dyn Specialist>>,
        consolidator: Consolidator,
        specialist_timeout: Duration,
    ) -> Result<Self, StockError> {
        let mut seen = BTreeSet::new();
        for specialist in &specialists {
            if !seen.insert(specialist.dimension()) {
                return Err(StockError::ConfigError(format!(
                    "more than one specialist registered for {}",
                    specialist.dimension()
                )));
            }
        }

        Ok(Self {
            validator,
            specialists,
            consolidator,
            specialist_timeout,
            listener: Arc::new(NoopListener),
        })
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        self.specialists.iter().map(|s| s.dimension()).collect()
    }

    /// Analyze one ticker end to end
    pub async fn run(&self, raw: &str) -> Result<FinalReport, WorkflowError> {
        let mut state = AnalysisState::new(raw);
        self.run_with_state(&mut state).await
    }

    /// Like [`run`](Self::run) but leaves the accumulated state with the caller
    #[instrument(
        skip(self, state),
        fields(run_id = %state.run_id(), requested = %state.requested())
    )]
    pub async fn run_with_state(
        &self,
        state: &mut AnalysisState,
    ) -> Result<FinalReport, WorkflowError> {
        let run_id = state.run_id();
        let mut run = Run {
            phase: WorkflowPhase::Start,
            state,
        };

        run.advance(WorkflowPhase::Validating);
        self.emit(WorkflowEvent::StageStarted {
            run_id,
            stage: Stage::Validation,
        });
        let symbol = match self.validator.validate(run.state.requested()).await {
            Ok(symbol) => symbol,
            Err(e) => return Err(self.fail(&mut run, e)),
        };
        if let Err(e) = run.state.mark_validated(symbol.clone()) {
            let err = WorkflowError::SymbolInvalid {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            };
            return Err(self.fail(&mut run, err));
        }
        tracing::info!(%symbol, "symbol validated");

        run.advance(WorkflowPhase::Analyzing);
        self.emit(WorkflowEvent::StageStarted {
            run_id,
            stage: Stage::Analysis,
        });
        self.fan_out(&symbol, run.state).await;
        tracing::info!(
            %symbol,
            succeeded = run.state.results().len(),
            failed = run.state.errors().len(),
            "specialists settled"
        );

        run.advance(WorkflowPhase::Consolidating);
        self.emit(WorkflowEvent::StageStarted {
            run_id,
            stage: Stage::Consolidation,
        });
        let report = match self.consolidator.consolidate(&symbol, run.state).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(&mut run, e)),
        };

        run.advance(WorkflowPhase::Done);
        self.emit(WorkflowEvent::VerdictReached {
            run_id,
            symbol,
            verdict: report.verdict,
        });
        if run.state.set_final_report(report.clone()).is_err() {
            tracing::warn!(%run_id, "state already carried a final report");
        }
        Ok(report)
    }

    /// Every specialist in its own task, each under the specialist deadline
    ///
    /// Outcomes are recorded in completion order. The tasks live in a
    /// [`JoinSet`], so dropping the run aborts whatever is still in flight.
    async fn fan_out(&self, symbol: &Symbol, state: &mut AnalysisState) {
        let timeout = self.specialist_timeout;
        let mut tasks = JoinSet::new();
        let mut dimensions = HashMap::with_capacity(self.specialists.len());

        for specialist in &self.specialists {
            let specialist = Arc::clone(specialist);
            let symbol = symbol.clone();
            let dimension = specialist.dimension();
            let span = tracing::info_span!("specialist", %dimension);

            let handle = tasks.spawn(
                async move {
                    match tokio::time::timeout(timeout, specialist.analyze(&symbol)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(DimensionError::TimedOut(timeout)),
                    }
                }
                .instrument(span),
            );
            dimensions.insert(handle.id(), dimension);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, Ok(outcome)),
                Err(e) => (e.id(), Err(e)),
            };
            match dimensions.get(&id) {
                Some(&dimension) => self.record(state, dimension, outcome),
                None => tracing::warn!(task = %id, "unknown specialist task finished"),
            }
        }
    }

    fn record(
        &self,
        state: &mut AnalysisState,
        dimension: Dimension,
        outcome: Result<Result<DimensionResult, DimensionError>, JoinError>,
    ) {
        let run_id = state.run_id();
        let outcome = match outcome {
            Ok(Ok(result)) if result.dimension() != dimension => {
                Err(DimensionError::Conflict(format!(
                    "{dimension} specialist returned a {} result",
                    result.dimension()
                )))
            }
            Ok(outcome) => outcome,
            Err(e) => Err(DimensionError::Crashed(e.to_string())),
        };

        let recorded = match outcome {
            Ok(result) => state.record_result(result).map(|()| {
                self.emit(WorkflowEvent::SpecialistCompleted { run_id, dimension });
            }),
            Err(error) => {
                tracing::warn!(%dimension, %error, "specialist failed");
                state.record_error(dimension, error.clone()).map(|()| {
                    self.emit(WorkflowEvent::SpecialistFailed {
                        run_id,
                        dimension,
                        error,
                    });
                })
            }
        };
        if let Err(e) = recorded {
            tracing::warn!(%dimension, error = %e, "specialist outcome discarded");
        }
    }

    fn fail(&self, run: &mut Run<'_>, err: WorkflowError) -> WorkflowError {
        run.advance(WorkflowPhase::Failed);
        self.emit(WorkflowEvent::Failed {
            run_id: run.state.run_id(),
            stage: err.stage(),
            reason: err.to_string(),
        });
        err
    }

    fn emit(&self, event: WorkflowEvent) {
        self.listener.on_event(&event);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("validator", &self.validator)
            .field("dimensions", &self.dimensions())
            .field("consolidator", &self.consolidator)
            .field("specialist_timeout", &self.specialist_timeout)
            .finish_non_exhaustive()
    }
}
