//! Price specialist

use super::{
    DimensionResult, Finding, Signal, Specialist, SpecialistDeps, bullet_list, fmt_opt, fmt_peso,
};
use crate::data::PriceData;
use crate::data::price::fetch_price;
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

pub struct PriceSpecialist {
    deps: Arc<SpecialistDeps>,
}

impl PriceSpecialist {
    pub fn new(deps: Arc<SpecialistDeps>) -> Self {
        Self { deps }
    }
}

pub fn price_signals(data: &PriceData) -> Vec<Signal> {
    let mut signals = Vec::new();

    if let Some(position) = data.range_position {
        if position <= 0.2 {
            signals.push(Signal::opportunity("trading in the bottom fifth of its 52-week range"));
        } else if position >= 0.95 {
            signals.push(Signal::risk("trading at the top of its 52-week range"));
        }
    }
    if data.day_change_pct.is_some_and(|c| c <= -3.0) {
        signals.push(Signal::risk("sharp one-day decline"));
    }

    signals
}

pub fn describe_price(data: &PriceData) -> String {
    let mut text = format!(
        "Company: {}\nCurrent price: {} {}\nPrevious close: {}\n52-week high: {}\n52-week low: {}\n",
        data.company_name.as_deref().unwrap_or(&data.symbol),
        fmt_peso(Some(data.current_price)),
        data.currency,
        fmt_peso(data.previous_close),
        fmt_peso(data.week_high_52),
        fmt_peso(data.week_low_52),
    );
    text.push_str(&format!(
        "Position in 52-week range: {}\nChange from previous close: {}\nDividend yield: {}\nREIT: {}\n",
        fmt_opt(data.range_position.map(|p| p * 100.0), "%"),
        fmt_opt(data.day_change_pct, "%"),
        fmt_opt(data.dividend_yield_pct, "%"),
        if data.is_reit { "yes" } else { "no" },
    ));
    text.push_str(&bullet_list("Likely price catalysts", &data.catalysts));
    text
}

#[async_trait]
impl Specialist for PriceSpecialist {
    fn dimension(&self) -> Dimension {
        Dimension::Price
    }

    #[instrument(skip(self), fields(dimension = "price"))]
    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError> {
        let data = fetch_price(&self.deps.data, symbol, &self.deps.thresholds).await?;
        let narrative = self
            .deps
            .narrate(Dimension::Price, symbol, &describe_price(&data), ())
            .await?;

        Ok(DimensionResult::Price(Finding {
            signals: price_signals(&data),
            data,
            narrative,
        }))
    }
}
