//! Dividend metrics and sustainability assessment

use super::MarketData;
use crate::api::{FinancialTrends, StockProfile};
use crate::config::Thresholds;
use crate::domain::Symbol;
use crate::error::DimensionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative change (%) that separates a flat series from a moving one
const FLAT_BAND_PCT: f64 = 5.0;

/// Direction of a multi-year series, first year against latest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesTrend {
    Rising,
    Falling,
    Flat,
    Insufficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sustainability {
    Strong,
    Adequate,
    Stretched,
    Unsustainable,
    NoDividend,
    /// Payout could not be computed
    Unknown,
}

impl Sustainability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Adequate => "adequate",
            Self::Stretched => "stretched",
            Self::Unsustainable => "unsustainable",
            Self::NoDividend => "no dividend",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendData {
    pub symbol: String,
    /// Fraction, 0.055 for 5.5 %
    pub dividend_yield: f64,
    /// Annual dividend per share
    pub dividend_rate: f64,
    /// Total dividends over latest net income
    pub payout_ratio: Option<f64>,
    pub is_reit: bool,
    /// Whether the payout meets the REIT distribution floor
    pub reit_compliant: Option<bool>,
    pub net_income_trend: BTreeMap<i32, f64>,
    pub revenue_trend: BTreeMap<i32, f64>,
    pub free_cash_flow_trend: BTreeMap<i32, f64>,
    pub income_direction: SeriesTrend,
    pub fcf_direction: SeriesTrend,
    pub sustainability: Sustainability,
    pub sustainability_note: String,
}

/// Upstream yields arrive as percentages (5.54) or fractions (0.0554)
pub fn normalize_yield(raw: f64) -> f64 {
    if raw > 1.0 { raw / 100.0 } else { raw }
}

pub fn series_trend(series: &BTreeMap<i32, f64>) -> SeriesTrend {
    let (Some((_, &first)), Some((_, &last))) = (series.first_key_value(), series.last_key_value())
    else {
        return SeriesTrend::Insufficient;
    };
    if series.len() < 2 {
        return SeriesTrend::Insufficient;
    }

    let change_pct = if first.abs() > f64::EPSILON {
        (last - first) / first.abs() * 100.0
    } else if last > first {
        f64::INFINITY
    } else if last < first {
        f64::NEG_INFINITY
    } else {
        0.0
    };

    if change_pct > FLAT_BAND_PCT {
        SeriesTrend::Rising
    } else if change_pct < -FLAT_BAND_PCT {
        SeriesTrend::Falling
    } else {
        SeriesTrend::Flat
    }
}

/// `rate * shares / latest net income`, `None` when any input is missing
/// or the company made a loss
pub fn payout_ratio(
    dividend_rate: f64,
    shares_outstanding: Option<f64>,
    net_income: &BTreeMap<i32, f64>,
) -> Option<f64> {
    let shares = shares_outstanding.filter(|s| *s > 0.0)?;
    let (_, &latest) = net_income.last_key_value()?;
    (dividend_rate > 0.0 && latest > 0.0).then(|| dividend_rate * shares / latest)
}

/// Payout ratio weighed against income and free cash flow direction
pub fn classify_sustainability(
    dividend_yield: f64,
    payout: Option<f64>,
    is_reit: bool,
    income: SeriesTrend,
    fcf: SeriesTrend,
    latest_fcf: Option<f64>,
) -> Sustainability {
    if dividend_yield <= 0.0 {
        return Sustainability::NoDividend;
    }
    let Some(payout) = payout else {
        return Sustainability::Unknown;
    };

    // REITs are built to pay out nearly everything
    let comfortable = if is_reit { 1.0 } else { 0.75 };
    let weakening = income == SeriesTrend::Falling
        || fcf == SeriesTrend::Falling
        || latest_fcf.is_some_and(|f| f < 0.0);

    if payout > 1.0 && income == SeriesTrend::Falling {
        Sustainability::Unsustainable
    } else if payout > 1.0 || (payout > comfortable && weakening) {
        Sustainability::Stretched
    } else if income == SeriesTrend::Rising && !weakening && payout <= comfortable {
        Sustainability::Strong
    } else {
        Sustainability::Adequate
    }
}

pub fn sustainability_note(
    is_reit: bool,
    payout: Option<f64>,
    net_income: &BTreeMap<i32, f64>,
    fcf: &BTreeMap<i32, f64>,
    reit_floor: f64,
) -> String {
    let mut parts = Vec::new();

    if is_reit {
        parts.push(format!(
            "This is a Philippine REIT, legally required to distribute at least {:.0}% of its \
             distributable income as dividends.",
            reit_floor * 100.0
        ));
    }

    if net_income.len() >= 3 {
        if let (Some((&first_year, &first)), Some((&last_year, &last))) =
            (net_income.first_key_value(), net_income.last_key_value())
        {
            if first > 0.0 && last > first {
                let growth = (last - first) / first * 100.0;
                parts.push(format!(
                    "Net income grew ~{growth:.0}% from {first_year} to {last_year} \
                     ({:.2}B → {:.2}B PHP), supporting the dividend.",
                    first / 1e9,
                    last / 1e9
                ));
            } else if last > 0.0 {
                parts.push(format!("Net income in {last_year}: {:.2}B PHP.", last / 1e9));
            }
        }
    }

    if let Some(ratio) = payout.filter(|r| *r > 0.0) {
        parts.push(format!("Estimated payout ratio: {:.1}%.", ratio * 100.0));
    }

    if let Some((&year, &latest)) = fcf.last_key_value() {
        if latest > 0.0 {
            parts.push(format!(
                "Free cash flow in {year}: {:.2}B PHP (positive).",
                latest / 1e9
            ));
        }
    }

    parts.join(" ")
}

pub fn dividend_from_parts(
    profile: &StockProfile,
    trends: Option<FinancialTrends>,
    t: &Thresholds,
) -> DividendData {
    let dividend_yield = normalize_yield(profile.dividend_yield_pct.unwrap_or(0.0));
    let dividend_rate = profile.price * dividend_yield;
    let trends = trends.unwrap_or_default();

    let payout = payout_ratio(dividend_rate, profile.shares_outstanding, &trends.net_income);
    let income_direction = series_trend(&trends.net_income);
    let fcf_direction = series_trend(&trends.free_cash_flow);
    let latest_fcf = trends.free_cash_flow.last_key_value().map(|(_, v)| *v);

    let sustainability = classify_sustainability(
        dividend_yield,
        payout,
        profile.is_reit,
        income_direction,
        fcf_direction,
        latest_fcf,
    );

    let reit_compliant = profile
        .is_reit
        .then_some(payout)
        .flatten()
        .map(|p| p >= t.reit_payout_floor);

    DividendData {
        symbol: profile.symbol.clone(),
        dividend_yield,
        dividend_rate,
        payout_ratio: payout,
        is_reit: profile.is_reit,
        reit_compliant,
        sustainability_note: sustainability_note(
            profile.is_reit,
            payout,
            &trends.net_income,
            &trends.free_cash_flow,
            t.reit_payout_floor,
        ),
        net_income_trend: trends.net_income,
        revenue_trend: trends.revenue,
        free_cash_flow_trend: trends.free_cash_flow,
        income_direction,
        fcf_direction,
        sustainability,
    }
}

pub async fn fetch_dividend(
    data: &MarketData,
    symbol: &Symbol,
    thresholds: &Thresholds,
) -> Result<DividendData, DimensionError> {
    let profile = data.profile(symbol).await.ok_or_else(|| {
        DimensionError::DataUnavailable(format!("no profile to derive dividends for {symbol}"))
    })?;

    // trends only matter when there is a dividend to sustain
    let trends = if profile.dividend_yield_pct.is_some_and(|y| y > 0.0) {
        data.financial_trends(symbol).await
    } else {
        None
    };

    Ok(dividend_from_parts(&profile, trends, thresholds))
}
