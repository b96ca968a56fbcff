//! Valuation specialist

use super::{DimensionResult, Finding, Signal, Specialist, SpecialistDeps, fmt_opt, fmt_peso};
use crate::data::ValuationData;
use crate::data::valuation::fetch_valuation;
use crate::domain::{Dimension, Symbol};
use crate::error::DimensionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Discount (%) to fair value that counts as a margin of safety
const MARGIN_OF_SAFETY_PCT: f64 = 15.0;

pub struct ValuationSpecialist {
    deps: Arc<SpecialistDeps>,
}

impl ValuationSpecialist {
    pub fn new(deps: Arc<SpecialistDeps>) -> Self {
        Self { deps }
    }
}

pub fn valuation_signals(data: &ValuationData) -> Vec<Signal> {
    let mut signals = Vec::new();

    if let Some(discount) = data.discount_pct {
        if discount >= MARGIN_OF_SAFETY_PCT {
            signals.push(Signal::opportunity(format!(
                "trading {discount:.1}% below estimated fair value"
            )));
        } else if discount <= -MARGIN_OF_SAFETY_PCT {
            signals.push(Signal::risk(format!(
                "trading {:.1}% above estimated fair value",
                -discount
            )));
        }
    }
    if data.has_negative_earnings() {
        signals.push(Signal::risk("negative earnings"));
    }

    signals
}

pub fn describe_valuation(data: &ValuationData) -> String {
    let mut text = format!(
        "Current price: {}\nP/E ratio: {}\nP/B ratio: {}\nPEG ratio: {}\nForward P/E: {}\nEPS: {}\nBook value per share: {}\nNet income growth (CAGR): {}\n",
        fmt_peso(Some(data.current_price)),
        data.pe,
        data.pb,
        data.peg,
        fmt_opt(data.forward_pe, ""),
        fmt_peso(data.eps),
        fmt_peso(data.book_value_per_share),
        fmt_opt(data.earnings_growth_pct, "%"),
    );

    match (data.fair_value, data.fair_value_method) {
        (Some(fv), Some(method)) => {
            text.push_str(&format!(
                "Estimated fair value: {} ({})\n",
                fmt_peso(Some(fv)),
                method.describe()
            ));
            if let Some(discount) = data.discount_pct {
                let side = if discount >= 0.0 { "below" } else { "above" };
                text.push_str(&format!(
                    "Price is {:.1}% {side} fair value\n",
                    discount.abs()
                ));
            }
        }
        _ => text.push_str("Estimated fair value: not meaningful (no positive earnings)\n"),
    }

    text
}

#[async_trait]
impl Specialist for ValuationSpecialist {
    fn dimension(&self) -> Dimension {
        Dimension::Valuation
    }

    #[instrument(skip(self), fields(dimension = "valuation"))]
    async fn analyze(&self, symbol: &Symbol) -> Result<DimensionResult, DimensionError> {
        let data = fetch_valuation(&self.deps.data, symbol).await?;
        let narrative = self
            .deps
            .narrate(Dimension::Valuation, symbol, &describe_valuation(&data), ())
            .await?;

        Ok(DimensionResult::Valuation(Finding {
            signals: valuation_signals(&data),
            data,
            narrative,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SignalKind;
    use crate::api::ValuationMultiples;
    use crate::data::valuation::valuation_from_parts;

    #[test]
    fn test_undervalued_is_opportunity() {
        let multiples = ValuationMultiples {
            pe_ratio: Some(10.0),
            pb_ratio: Some(1.0),
            ..Default::default()
        };
        let data = valuation_from_parts("TEL", 20.0, &multiples, None);
        let signals = valuation_signals(&data);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Opportunity);
        assert_eq!(signals[0].label, "trading 33.3% below estimated fair value");
    }

    #[test]
    fn test_loss_maker_is_risk() {
        let multiples = ValuationMultiples {
            pe_ratio: Some(-6.0),
            pb_ratio: Some(0.8),
            ..Default::default()
        };
        let data = valuation_from_parts("LOSS", 3.0, &multiples, None);
        let signals = valuation_signals(&data);
        assert_eq!(signals, vec![Signal::risk("negative earnings")]);

        let text = describe_valuation(&data);
        assert!(text.contains("P/E ratio: not meaningful (negative earnings)"));
        assert!(text.contains("Estimated fair value: not meaningful"));
    }

    #[test]
    fn test_describe_graham_value() {
        let multiples = ValuationMultiples {
            eps: Some(2.0),
            book_value_per_share: Some(18.0),
            ..Default::default()
        };
        let data = valuation_from_parts("XYZ", 25.0, &multiples, None);
        let text = describe_valuation(&data);
        assert!(text.contains("Estimated fair value: ₱28.46 (Graham Number"));
        assert!(text.contains("P/E ratio: 12.50"));
    }
}
