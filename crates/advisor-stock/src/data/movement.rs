//! 52-week price movement, trend and candlestick context

use super::MarketData;
use super::candlestick::{self, CandlestickSummary};
use super::indicators;
use crate::api::{Candle, PerformanceSnapshot, StockProfile};
use crate::config::Thresholds;
use crate::domain::Symbol;
use crate::error::DimensionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uptrend => "uptrend",
            Self::Downtrend => "downtrend",
            Self::Sideways => "sideways",
        }
    }
}

/// Where the movement figures came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementBasis {
    DailyHistory,
    /// 52-week range plus reported performance, no daily bars
    RangeAndPerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyClose {
    /// `YYYY-MM`
    pub month: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementData {
    pub symbol: String,
    pub basis: MovementBasis,
    pub current_price: f64,
    pub year_start_price: f64,
    pub year_change_pct: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    /// Daily return std in percent; monthly when only performance data exists
    pub volatility_pct: Option<f64>,
    pub max_drawdown_pct: f64,
    pub trend: TrendDirection,
    pub monthly_closes: Vec<MonthlyClose>,
    pub candlestick: CandlestickSummary,
    pub performance_summary: Option<String>,
    pub catalysts: Vec<String>,
}

pub fn classify_trend(change_pct: f64, t: &Thresholds) -> TrendDirection {
    if change_pct > t.trend_up_pct {
        TrendDirection::Uptrend
    } else if change_pct < t.trend_down_pct {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Sideways
    }
}

/// Average close per calendar month, oldest first
pub fn monthly_averages(candles: &[Candle]) -> Vec<MonthlyClose> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for candle in candles {
        let entry = buckets
            .entry(candle.date.format("%Y-%m").to_string())
            .or_insert((0.0, 0));
        entry.0 += candle.close;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(month, (sum, count))| MonthlyClose {
            month,
            average: sum / count as f64,
        })
        .collect()
}

fn movement_catalysts(
    change_pct: f64,
    drawdown_pct: f64,
    performance: Option<&PerformanceSnapshot>,
) -> Vec<String> {
    let mut catalysts = Vec::new();

    if let Some(perf) = performance {
        if let (Some(month), Some(quarter)) = (perf.perf_1m, perf.perf_3m) {
            if month > 0.0 && quarter < 0.0 {
                catalysts.push(format!(
                    "Short-term rebound: up {month:.1}% over the past month after a {quarter:.1}% \
                     three-month decline."
                ));
            } else if month < 0.0 && quarter > 0.0 {
                catalysts.push(format!(
                    "Recent pullback: down {month:.1}% over the past month despite a {quarter:+.1}% \
                     three-month gain."
                ));
            }
        }
    }

    if drawdown_pct <= -20.0 && change_pct > 0.0 {
        catalysts.push(format!(
            "Recovered from a {drawdown_pct:.1}% drawdown to finish the period \
             {change_pct:+.1}% higher."
        ));
    }

    catalysts
}

/// Movement from daily bars, `None` below two usable closes
pub fn movement_from_history(
    symbol: &str,
    candles: &[Candle],
    performance: Option<&PerformanceSnapshot>,
    t: &Thresholds,
) -> Option<MovementData> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).filter(|c| *c > 0.0).collect();
    let (&first, &last) = (closes.first()?, closes.last()?);
    if closes.len() < 2 {
        return None;
    }

    let change = (last - first) / first * 100.0;
    let high = candles.iter().map(|c| c.high.max(c.close)).fold(f64::MIN, f64::max);
    let low = candles
        .iter()
        .map(|c| if c.low > 0.0 { c.low.min(c.close) } else { c.close })
        .fold(f64::MAX, f64::min);
    let drawdown = indicators::max_drawdown_pct(&closes);
    let volatility = indicators::std_dev(&indicators::daily_returns(&closes)).map(|s| s * 100.0);

    Some(MovementData {
        symbol: symbol.to_string(),
        basis: MovementBasis::DailyHistory,
        current_price: last,
        year_start_price: first,
        year_change_pct: change,
        high_52w: high,
        low_52w: low,
        volatility_pct: volatility,
        max_drawdown_pct: drawdown,
        trend: classify_trend(change, t),
        monthly_closes: monthly_averages(candles),
        candlestick: candlestick::analyse(candles, t),
        performance_summary: performance.map(PerformanceSnapshot::summary),
        catalysts: movement_catalysts(change, drawdown, performance),
    })
}

/// Movement from the 52-week range when no daily bars are available
pub fn movement_from_range(
    profile: &StockProfile,
    performance: Option<&PerformanceSnapshot>,
    t: &Thresholds,
) -> Option<MovementData> {
    let current = Some(profile.price).filter(|p| *p > 0.0)?;
    let high = profile
        .week_high_52
        .or_else(|| performance.and_then(|p| p.week_high_52))
        .filter(|h| *h > 0.0)?;
    let low = profile
        .week_low_52
        .or_else(|| performance.and_then(|p| p.week_low_52))
        .filter(|l| *l > 0.0)?;

    let perf_year = performance.and_then(|p| p.perf_year);
    let (change, year_start) = match perf_year {
        Some(pct) if pct > -100.0 => (pct, current / (1.0 + pct / 100.0)),
        _ => ((current - low) / low * 100.0, low),
    };
    let drawdown = (low - high) / high * 100.0;

    Some(MovementData {
        symbol: profile.symbol.clone(),
        basis: MovementBasis::RangeAndPerformance,
        current_price: current,
        year_start_price: year_start,
        year_change_pct: change,
        high_52w: high,
        low_52w: low,
        volatility_pct: performance.and_then(|p| p.volatility_monthly),
        max_drawdown_pct: drawdown,
        trend: classify_trend(change, t),
        monthly_closes: Vec::new(),
        candlestick: CandlestickSummary::default(),
        performance_summary: performance.map(PerformanceSnapshot::summary),
        catalysts: movement_catalysts(change, drawdown, performance),
    })
}

pub async fn fetch_movement(
    data: &MarketData,
    symbol: &Symbol,
    thresholds: &Thresholds,
) -> Result<MovementData, DimensionError> {
    let (history, performance) = tokio::join!(data.daily_history(symbol), data.performance(symbol));

    if let Some(candles) = history {
        if let Some(movement) =
            movement_from_history(symbol.as_str(), &candles, performance.as_ref(), thresholds)
        {
            return Ok(movement);
        }
        tracing::debug!(%symbol, bars = candles.len(), "history too short, using 52-week range");
    }

    let profile = data.profile(symbol).await.ok_or_else(|| {
        DimensionError::DataUnavailable(format!("no price history or 52-week range for {symbol}"))
    })?;

    movement_from_range(&profile, performance.as_ref(), thresholds).ok_or_else(|| {
        DimensionError::DataUnavailable(format!("incomplete 52-week range for {symbol}"))
    })
}
