//! Dividend specialist

use super::{DimensionResult, Finding, Signal, Specialist, SpecialistDeps, fmt_opt, fmt_peso};
use crate::data::DividendData;
use crate::data::dividend::{Sustainability, fetch_dividend};
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Yield (fraction) above which a sustainable dividend counts in favour
const ATTRACTIVE_YIELD: f64 = 0.03;

pub struct DividendSpecialist {
    deps: Arc<SpecialistDeps>,
}

impl DividendSpecialist {
    pub fn new(deps: Arc<SpecialistDeps>) -> Self {
        Self { deps }
    }
}

pub fn dividend_signals(data: &DividendData) -> Vec<Signal> {
    let mut signals = Vec::new();

    if data.dividend_yield >= ATTRACTIVE_YIELD
        && matches!(data.sustainability, Sustainability::Strong | Sustainability::Adequate)
    {
        signals.push(Signal::opportunity(format!(
            "{:.1}% yield with {} coverage",
            data.dividend_yield * 100.0,
            data.sustainability.as_str()
        )));
    }
    if matches!(
        data.sustainability,
        Sustainability::Stretched | Sustainability::Unsustainable
    ) {
        signals.push(Signal::risk(format!(
            "dividend looks {}",
            data.sustainability.as_str()
        )));
    }
    if data.reit_compliant == Some(false) {
        signals.push(Signal::risk("REIT payout below the distribution requirement"));
    }

    signals
}

fn series_line(label: &str, series: &BTreeMap<i32, f64>) -> String {
    if series.is_empty() {
        return format!("{label}: N/A\n");
    }
    let points: Vec<String> = series
        .iter()
        .map(|(year, value)| format!("{year}: {:.2}B", value / 1e9))
        .collect();
    format!("{label} (PHP): {}\n", points.join(", "))
}

pub fn describe_dividend(data: &DividendData) -> String {
    let mut text = format!(
        "Dividend yield: {}\nAnnual dividend per share (estimated): {}\nPayout ratio (estimated): {}\n",
        fmt_opt(Some(data.dividend_yield * 100.0), "%"),
        fmt_peso(Some(data.dividend_rate)),
        fmt_opt(data.payout_ratio.map(|p| p * 100.0), "%"),
    );
    text.push_str(&series_line("Net income", &data.net_income_trend));
    text.push_str(&series_line("Revenue", &data.revenue_trend));
    text.push_str(&series_line("Free cash flow", &data.free_cash_flow_trend));
    text.push_str(&format!(
        "Sustainability assessment: {}\n",
        data.sustainability.as_str()
    ));
    if !data.sustainability_note.is_empty() {
        text.push_str(&format!("Notes: {}\n", data.sustainability_note));
    }
    text
}

#[async_trait]
impl Specialist for DividendSpecialist {
    fn dimension(&self) -> Dimension {
        Dimension::Dividend
    }

    #[instrument(skip(self), fields(dimension = "dividend"))]
    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError> {
        let data = fetch_dividend(&self.deps.data, symbol, &self.deps.thresholds).await?;
        let narrative = self
            .deps
            .narrate(
                Dimension::Dividend,
                symbol,
                &describe_dividend(&data),
                json!({ "is_reit": data.is_reit }),
            )
            .await?;

        Ok(DimensionResult::Dividend(Finding {
            signals: dividend_signals(&data),
            data,
            narrative,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SignalKind;
    use crate::data::dividend::SeriesTrend;

    fn data(
        dividend_yield: f64,
        sustainability: Sustainability,
        reit_compliant: Option<bool>,
    ) -> DividendData {
        DividendData {
            symbol: "AREIT".to_string(),
            dividend_yield,
            dividend_rate: 2.2,
            payout_ratio: Some(0.95),
            is_reit: reit_compliant.is_some(),
            reit_compliant,
            net_income_trend: [(2022, 1.8e9), (2023, 2.1e9)].into_iter().collect(),
            revenue_trend: BTreeMap::new(),
            free_cash_flow_trend: BTreeMap::new(),
            income_direction: SeriesTrend::Rising,
            fcf_direction: SeriesTrend::Insufficient,
            sustainability,
            sustainability_note: String::new(),
        }
    }

    #[test]
    fn test_sustainable_yield_is_opportunity() {
        let signals = dividend_signals(&data(0.055, Sustainability::Strong, Some(true)));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Opportunity);
        assert_eq!(signals[0].label, "5.5% yield with strong coverage");
    }

    #[test]
    fn test_stretched_and_non_compliant_are_risks() {
        let signals = dividend_signals(&data(0.06, Sustainability::Stretched, Some(false)));
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|s| s.kind == SignalKind::Risk));
    }

    #[test]
    fn test_describe_dividend() {
        let text = describe_dividend(&data(0.055, Sustainability::Strong, None));
        assert!(text.starts_with("Dividend yield: 5.50%"));
        assert!(text.contains("Net income (PHP): 2022: 1.80B, 2023: 2.10B"));
        assert!(text.contains("Revenue: N/A"));
        assert!(text.contains("Sustainability assessment: strong"));
    }
}
