//! Consolidation: specialist narratives in, one verdict out

use super::{DimensionResult, SignalKind};
use crate::domain::{Dimension, Symbol, Verdict};
use crate::engine::report::{FinalReport, VerdictBasis};
use crate::engine::state::AnalysisState;
use crate::error::WorkflowError;
use crate::prompts::{PromptLibrary, SectionInput};
use crate::reasoning::ReasoningBackend;
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::instrument;

static VERDICT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*{0,2}Verdict:?\*{0,2}\s*\*{0,2}(NOT\s+BUY|BUY)\b")
        .expect("verdict line pattern is valid")
});
static NOT_BUY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNOT\s+BUY\b").expect("not-buy pattern is valid"));
static BUY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bBUY\b").expect("buy pattern is valid"));

/// Verdict stated in a consolidation narrative
///
/// The requested `**Verdict:** X` line wins; otherwise the last standalone
/// `NOT BUY` or `BUY` in the text decides. `None` when neither appears.
pub fn extract_verdict(text: &str) -> Option<Verdict> {
    if let Some(caps) = VERDICT_LINE.captures(text) {
        let word = caps.get(1).map_or("", |m| m.as_str());
        return Some(if word.to_uppercase().starts_with("NOT") {
            Verdict::NotBuy
        } else {
            Verdict::Buy
        });
    }

    let last_not_buy = NOT_BUY.find_iter(text).last();
    let last_buy = BUY.find_iter(text).last()?;
    match last_not_buy {
        // the final BUY is the tail of the final NOT BUY
        Some(nb) if last_buy.start() <= nb.end() => Some(Verdict::NotBuy),
        _ => Some(Verdict::Buy),
    }
}

/// Tally of opportunity and risk signals across the available dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalScore {
    pub opportunities: usize,
    pub risks: usize,
}

impl SignalScore {
    pub fn verdict(&self) -> Verdict {
        if self.opportunities > self.risks {
            Verdict::Buy
        } else {
            Verdict::NotBuy
        }
    }
}

pub fn score_signals<'a>(results: impl IntoIterator<Item = &'a DimensionResult>) -> SignalScore {
    let mut score = SignalScore::default();
    for signal in results.into_iter().flat_map(DimensionResult::signals) {
        match signal.kind {
            SignalKind::Opportunity => score.opportunities += 1,
            SignalKind::Risk => score.risks += 1,
        }
    }
    score
}

pub fn limitation_note(dimension: Dimension, reason: &str) -> String {
    format!("Data limitation: {} unavailable ({reason}).", dimension.title())
}

fn confidence_note(missing: usize) -> String {
    format!(
        "Confidence is reduced: {missing} of {} analysis areas could not be completed.",
        Dimension::ALL.len()
    )
}

/// Deterministic summary used when the reasoning backend is unavailable
pub fn fallback_summary(symbol: &Symbol, state: &AnalysisState, score: SignalScore) -> String {
    let mut text = format!(
        "Automated summary for {symbol}. The narrative consolidation step was unavailable, so \
         this verdict is based on a count of rule-based signals from each analysis area.\n\n"
    );

    for (dimension, result) in state.results() {
        text.push_str(&format!("**{}:**\n", dimension.title()));
        if result.signals().is_empty() {
            text.push_str("No notable signals.\n\n");
        } else {
            for signal in result.signals() {
                let marker = match signal.kind {
                    SignalKind::Opportunity => "+",
                    SignalKind::Risk => "-",
                };
                text.push_str(&format!("{marker} {}\n", signal.label));
            }
            text.push('\n');
        }
    }

    let missing = Dimension::ALL.len() - state.results().len();
    if missing > 0 {
        text.push_str(&confidence_note(missing));
        text.push_str("\n\n");
    }

    let verdict = score.verdict();
    text.push_str(&format!(
        "**Verdict:** {verdict}\n{} opportunity signal(s) against {} risk signal(s).",
        score.opportunities, score.risks
    ));
    text
}

/// Merges specialist output into a [`FinalReport`]
///
/// A failing or slow reasoning backend degrades the report to the signal
/// scorer and a templated summary rather than failing the run.
pub struct Consolidator {
    reasoning: Arc<dyn ReasoningBackend>,
    prompts: Arc<PromptLibrary>,
    timeout: Duration,
}

impl Consolidator {
    pub fn new(
        reasoning: Arc<dyn ReasoningBackend>,
        prompts: Arc<PromptLibrary>,
        timeout: Duration,
    ) -> Self {
        Self {
            reasoning,
            prompts,
            timeout,
        }
    }

    fn sections(state: &AnalysisState) -> Vec<SectionInput> {
        Dimension::ALL
            .into_iter()
            .map(|dimension| match (state.result(dimension), state.error(dimension)) {
                (Some(result), _) => SectionInput {
                    title: dimension.title(),
                    body: result.narrative().to_string(),
                    available: true,
                },
                (None, Some(err)) => SectionInput {
                    title: dimension.title(),
                    body: err.to_string(),
                    available: false,
                },
                (None, None) => SectionInput {
                    title: dimension.title(),
                    body: "not analysed".to_string(),
                    available: false,
                },
            })
            .collect()
    }

    /// Narrative from the backend, `None` on any failure
    async fn narrate(&self, symbol: &Symbol, sections: &[SectionInput]) -> Option<String> {
        let prompt = match self.prompts.consolidation(symbol, sections) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "consolidation prompt failed to render");
                return None;
            }
        };

        match tokio::time::timeout(self.timeout, self.reasoning.complete(&prompt)).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!(
                    %symbol,
                    error = %e,
                    "consolidation reasoning failed, using signal scorer"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    %symbol,
                    timeout = ?self.timeout,
                    "consolidation timed out, using signal scorer"
                );
                None
            }
        }
    }

    #[instrument(skip(self, state), fields(run_id = %state.run_id()))]
    pub async fn consolidate(
        &self,
        symbol: &Symbol,
        state: &AnalysisState,
    ) -> Result<FinalReport, WorkflowError> {
        if state.results().is_empty() {
            return Err(WorkflowError::NoAnalysisAvailable {
                symbol: symbol.to_string(),
                errors: state.errors().clone(),
            });
        }

        let score = score_signals(state.results().values());
        let sections = Self::sections(state);

        let (verdict, summary, basis) = match self.narrate(symbol, &sections).await {
            Some(text) => match extract_verdict(&text) {
                Some(verdict) => (verdict, text, VerdictBasis::Reasoning),
                None => {
                    tracing::info!(%symbol, "no verdict in narrative, using signal scorer");
                    (score.verdict(), text, VerdictBasis::Signals)
                }
            },
            None => (
                score.verdict(),
                fallback_summary(symbol, state, score),
                VerdictBasis::Signals,
            ),
        };

        let limitations: Vec<String> = Dimension::ALL
            .into_iter()
            .filter(|d| state.result(*d).is_none())
            .map(|d| {
                let reason = state
                    .error(d)
                    .map_or_else(|| "not analysed".to_string(), ToString::to_string);
                limitation_note(d, &reason)
            })
            .collect();

        let sections: BTreeMap<Dimension, String> = state
            .results()
            .iter()
            .map(|(d, r)| (*d, r.narrative().to_string()))
            .collect();

        tracing::info!(
            %symbol,
            %verdict,
            basis = basis.as_str(),
            sections = sections.len(),
            "report consolidated"
        );

        Ok(FinalReport {
            symbol: symbol.clone(),
            verdict,
            summary,
            sections,
            limitations,
            verdict_basis: basis,
            generated_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
