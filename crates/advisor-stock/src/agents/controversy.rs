//! Controversy / risk specialist

use super::{DimensionResult, Finding, Signal, Specialist, SpecialistDeps, bullet_list, fmt_opt};
use crate::data::ControversyData;
use crate::data::controversy::fetch_controversy;
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Spike count at which the anomalies themselves become a risk
const FREQUENT_SPIKES: usize = 3;

pub struct ControversySpecialist {
    deps: Arc<SpecialistDeps>,
}

impl ControversySpecialist {
    pub fn new(deps: Arc<SpecialistDeps>) -> Self {
        Self { deps }
    }
}

pub fn controversy_signals(data: &ControversyData) -> Vec<Signal> {
    let mut signals: Vec<Signal> = data.risk_factors.iter().map(Signal::risk).collect();
    if data.spikes.len() >= FREQUENT_SPIKES {
        signals.push(Signal::risk(format!(
            "{} abnormal price spikes in the past year",
            data.spikes.len()
        )));
    }
    signals
}

pub fn describe_controversy(data: &ControversyData) -> String {
    let mut text = String::new();

    if data.history_available {
        text.push_str(&format!(
            "Daily return volatility: {}\n",
            fmt_opt(data.return_volatility.map(|v| v * 100.0), "%")
        ));
        if data.spikes.is_empty() {
            text.push_str("Sudden price spikes: none detected\n");
        } else {
            text.push_str(&bullet_list("Sudden price spikes", &data.spike_lines()));
        }
        if data.risk_factors.is_empty() {
            text.push_str("Risk factors: none flagged\n");
        } else {
            text.push_str(&bullet_list("Risk factors", &data.risk_factors));
        }
    } else {
        text.push_str("Price history unavailable; spike and risk checks skipped.\n");
    }

    if data.news.is_empty() {
        text.push_str("Recent news: none found\n");
    } else {
        text.push_str(&bullet_list("Recent news", &data.news));
    }

    text
}

#[async_trait]
impl Specialist for ControversySpecialist {
    fn dimension(&self) -> Dimension {
        Dimension::Controversy
    }

    #[instrument(skip(self), fields(dimension = "controversy"))]
    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError> {
        let data = fetch_controversy(&self.deps.data, symbol, &self.deps.thresholds).await?;
        let narrative = self
            .deps
            .narrate(Dimension::Controversy, symbol, &describe_controversy(&data), ())
            .await?;

        Ok(DimensionResult::Controversy(Finding {
            signals: controversy_signals(&data),
            data,
            narrative,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::indicators::PriceSpike;
    use chrono::NaiveDate;

    fn spike(day: u32) -> PriceSpike {
        PriceSpike {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            daily_return: 0.12,
            rolling_std: 0.015,
        }
    }

    fn data(spikes: Vec<PriceSpike>, factors: Vec<String>) -> ControversyData {
        ControversyData {
            symbol: "TEL".to_string(),
            spikes,
            risk_factors: factors,
            news: vec!["[BusinessWorld] PLDT books higher profit".to_string()],
            return_volatility: Some(0.018),
            history_available: true,
        }
    }

    #[test]
    fn test_signals_from_factors_and_spikes() {
        let calm = data(vec![spike(1)], Vec::new());
        assert!(controversy_signals(&calm).is_empty());

        let noisy = data(
            vec![spike(1), spike(8), spike(15)],
            vec!["High daily volatility (std > 4%)".to_string()],
        );
        let signals = controversy_signals(&noisy);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1].label, "3 abnormal price spikes in the past year");
    }

    #[test]
    fn test_describe_controversy() {
        let text = describe_controversy(&data(vec![spike(4)], Vec::new()));
        assert!(text.contains("Daily return volatility: 1.80%"));
        assert!(text.contains("- 2024-03-04: spike up of 12.0%"));
        assert!(text.contains("Risk factors: none flagged"));
        assert!(text.contains("Recent news:\n- [BusinessWorld] PLDT books higher profit"));
    }
}
