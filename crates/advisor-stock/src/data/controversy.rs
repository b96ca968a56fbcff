//! Price anomalies, risk factors and recent headlines

use super::MarketData;
use super::indicators::{self, PriceSpike};
use crate::api::Candle;
use crate::config::Thresholds;
use crate::domain::Symbol;
use crate::error::DimensionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControversyData {
    pub symbol: String,
    pub spikes: Vec<PriceSpike>,
    pub risk_factors: Vec<String>,
    pub news: Vec<String>,
    /// Whole-period daily return std as a fraction
    pub return_volatility: Option<f64>,
    pub history_available: bool,
}

impl ControversyData {
    pub fn spike_lines(&self) -> Vec<String> {
        self.spikes.iter().map(PriceSpike::describe).collect()
    }
}

/// Volatility and price-versus-average risk factors
pub fn risk_factors(candles: &[Candle], t: &Thresholds) -> Vec<String> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).filter(|c| *c > 0.0).collect();
    let mut factors = Vec::new();

    if let Some(std) = indicators::std_dev(&indicators::daily_returns(&closes)) {
        if std > t.high_volatility {
            factors.push(format!(
                "High daily volatility (std > {:.0}%)",
                t.high_volatility * 100.0
            ));
        }
    }

    if let (Some(avg), Some(&last)) = (indicators::mean(&closes), closes.last()) {
        if last > avg * t.overvaluation_multiplier {
            factors.push(format!(
                "Current price is more than {:.0}% above 52-week average, potential overvaluation",
                (t.overvaluation_multiplier - 1.0) * 100.0
            ));
        } else if last < avg * t.distress_multiplier {
            factors.push(format!(
                "Current price is more than {:.0}% below 52-week average, potential distress",
                (1.0 - t.distress_multiplier) * 100.0
            ));
        }
    }

    factors
}

pub fn controversy_from_parts(
    symbol: &str,
    history: Option<&[Candle]>,
    headlines: Vec<String>,
    t: &Thresholds,
) -> ControversyData {
    let candles = history.unwrap_or_default();
    let returns = indicators::dated_returns(candles);
    let plain: Vec<f64> = returns.iter().map(|(_, r)| *r).collect();

    ControversyData {
        symbol: symbol.to_string(),
        spikes: indicators::detect_spikes(
            &returns,
            t.spike_window,
            t.spike_std_multiplier,
            t.spike_min_abs_return,
        ),
        risk_factors: risk_factors(candles, t),
        news: headlines,
        return_volatility: indicators::std_dev(&plain),
        history_available: history.is_some_and(|c| !c.is_empty()),
    }
}

pub async fn fetch_controversy(
    data: &MarketData,
    symbol: &Symbol,
    thresholds: &Thresholds,
) -> Result<ControversyData, DimensionError> {
    let (history, news) = tokio::join!(data.daily_history(symbol), data.news(symbol));

    let history = history.filter(|c| !c.is_empty());
    let headlines: Vec<String> = news
        .unwrap_or_default()
        .iter()
        .map(|item| item.headline())
        .collect();

    if history.is_none() && headlines.is_empty() {
        return Err(DimensionError::DataUnavailable(format!(
            "no price history or news for {symbol}"
        )));
    }

    Ok(controversy_from_parts(
        symbol.as_str(),
        history.as_deref(),
        headlines,
        thresholds,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_overvaluation_factor() {
        let mut closes = vec![10.0; 30];
        closes.push(14.0);
        let factors = risk_factors(&candles(&closes), &Thresholds::default());
        assert!(factors.iter().any(|f| f.ends_with("potential overvaluation")));
    }

    #[test]
    fn test_distress_and_volatility_factors() {
        let closes = [10.0, 11.0, 9.5, 10.5, 9.0, 10.0, 6.0];
        let factors = risk_factors(&candles(&closes), &Thresholds::default());
        assert!(factors.contains(&"High daily volatility (std > 4%)".to_string()));
        assert!(factors.iter().any(|f| f.ends_with("potential distress")));
    }

    #[test]
    fn test_calm_series_has_no_factors() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + f64::from(i % 3)).collect();
        assert!(risk_factors(&candles(&closes), &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_controversy_from_parts_finds_spike() {
        let mut closes: Vec<f64> = (0..25)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        closes.push(115.0);
        let history = candles(&closes);

        let data = controversy_from_parts(
            "TEL",
            Some(&history),
            vec!["[Inquirer] PLDT raises capex".to_string()],
            &Thresholds::default(),
        );
        assert_eq!(data.spikes.len(), 1);
        assert!(data.spike_lines()[0].contains("spike up"));
        assert!(data.history_available);
        assert_eq!(data.news.len(), 1);
    }

    #[test]
    fn test_news_only() {
        let data = controversy_from_parts(
            "TEL",
            None,
            vec!["PLDT dividend".to_string()],
            &Thresholds::default(),
        );
        assert!(data.spikes.is_empty());
        assert!(data.risk_factors.is_empty());
        assert!(!data.history_available);
    }
}
