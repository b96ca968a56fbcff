//! Price movement specialist

use super::{
    DimensionResult, Finding, Signal, Specialist, SpecialistDeps, bullet_list, fmt_opt, fmt_peso,
};
use crate::config::Thresholds;
use crate::data::MovementData;
use crate::data::movement::{MovementBasis, TrendDirection, fetch_movement};
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

const DEEP_DRAWDOWN_PCT: f64 = -30.0;

pub struct MovementSpecialist {
    deps: Arc<SpecialistDeps>,
}

impl MovementSpecialist {
    pub fn new(deps: Arc<SpecialistDeps>) -> Self {
        Self { deps }
    }
}

pub fn movement_signals(data: &MovementData, t: &Thresholds) -> Vec<Signal> {
    let mut signals = Vec::new();

    match data.trend {
        TrendDirection::Uptrend => signals.push(Signal::opportunity(format!(
            "uptrend, {:+.1}% over the year",
            data.year_change_pct
        ))),
        TrendDirection::Downtrend => signals.push(Signal::risk(format!(
            "downtrend, {:+.1}% over the year",
            data.year_change_pct
        ))),
        TrendDirection::Sideways => {}
    }
    if data.max_drawdown_pct <= DEEP_DRAWDOWN_PCT {
        signals.push(Signal::risk(format!(
            "deep drawdown of {:.1}%",
            data.max_drawdown_pct
        )));
    }
    // daily-bar volatility is in percent of a day; compare like with like
    if data.basis == MovementBasis::DailyHistory
        && data.volatility_pct.is_some_and(|v| v > t.high_volatility * 100.0)
    {
        signals.push(Signal::risk("high daily volatility"));
    }

    signals
}

pub fn describe_movement(data: &MovementData) -> String {
    let mut text = format!(
        "Price 1 year ago: {}\nCurrent price: {}\n1-year change: {:+.2}%\nTrend: {}\n52-week high: {}\n52-week low: {}\nMaximum drawdown: {:.2}%\n",
        fmt_peso(Some(data.year_start_price)),
        fmt_peso(Some(data.current_price)),
        data.year_change_pct,
        data.trend.as_str(),
        fmt_peso(Some(data.high_52w)),
        fmt_peso(Some(data.low_52w)),
        data.max_drawdown_pct,
    );

    let volatility_label = match data.basis {
        MovementBasis::DailyHistory => "Daily volatility (std of daily % changes)",
        MovementBasis::RangeAndPerformance => "Monthly volatility",
    };
    text.push_str(&format!("{volatility_label}: {}\n", fmt_opt(data.volatility_pct, "%")));

    if let Some(summary) = data.performance_summary.as_deref().filter(|s| !s.is_empty()) {
        text.push_str(&format!("Performance: {summary}\n"));
    }

    if !data.monthly_closes.is_empty() {
        let months: Vec<String> = data
            .monthly_closes
            .iter()
            .map(|m| format!("{} ₱{:.2}", m.month, m.average))
            .collect();
        text.push_str(&format!("Monthly average closes: {}\n", months.join(", ")));
    }

    if data.basis == MovementBasis::DailyHistory {
        text.push_str("Candlestick patterns:\n");
        text.push_str(&data.candlestick.to_text());
        text.push('\n');
    } else {
        text.push_str("Daily price history unavailable; figures derived from the 52-week range.\n");
    }

    text.push_str(&bullet_list("Movement catalysts", &data.catalysts));
    text
}

#[async_trait]
impl Specialist for MovementSpecialist {
    fn dimension(&self) -> Dimension {
        Dimension::Movement
    }

    #[instrument(skip(self), fields(dimension = "movement"))]
    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError> {
        let data = fetch_movement(&self.deps.data, symbol, &self.deps.thresholds).await?;
        let narrative = self
            .deps
            .narrate(Dimension::Movement, symbol, &describe_movement(&data), ())
            .await?;

        Ok(DimensionResult::Movement(Finding {
            signals: movement_signals(&data, &self.deps.thresholds),
            data,
            narrative,
        }))
    }
}
