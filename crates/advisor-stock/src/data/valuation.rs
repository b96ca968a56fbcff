//! Valuation ratios and Graham fair value

use super::MarketData;
use crate::api::{FinancialTrends, ValuationMultiples};
use crate::domain::Symbol;
use crate::error::DimensionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Multiple applied to EPS when the Graham number is undefined
pub const EARNINGS_MULTIPLE: f64 = 15.0;

const GRAHAM_FACTOR: f64 = 22.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotMeaningfulReason {
    MissingInput,
    ZeroDenominator,
    NegativeEarnings,
    NegativeBookValue,
    NonPositiveGrowth,
}

impl NotMeaningfulReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInput => "missing input",
            Self::ZeroDenominator => "zero denominator",
            Self::NegativeEarnings => "negative earnings",
            Self::NegativeBookValue => "negative book value",
            Self::NonPositiveGrowth => "non-positive growth",
        }
    }
}

/// A ratio that may be undefined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Ratio {
    Value(f64),
    NotMeaningful(NotMeaningfulReason),
}

impl Ratio {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NotMeaningful(_) => None,
        }
    }

    pub fn is_meaningful(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::NotMeaningful(reason) => write!(f, "not meaningful ({})", reason.as_str()),
        }
    }
}

pub fn pe_ratio(price: f64, eps: Option<f64>) -> Ratio {
    match eps {
        None => Ratio::NotMeaningful(NotMeaningfulReason::MissingInput),
        Some(e) if e == 0.0 => Ratio::NotMeaningful(NotMeaningfulReason::ZeroDenominator),
        Some(e) if e < 0.0 => Ratio::NotMeaningful(NotMeaningfulReason::NegativeEarnings),
        Some(e) => Ratio::Value(price / e),
    }
}

pub fn pb_ratio(price: f64, book_value_per_share: Option<f64>) -> Ratio {
    match book_value_per_share {
        None => Ratio::NotMeaningful(NotMeaningfulReason::MissingInput),
        Some(b) if b == 0.0 => Ratio::NotMeaningful(NotMeaningfulReason::ZeroDenominator),
        Some(b) if b < 0.0 => Ratio::NotMeaningful(NotMeaningfulReason::NegativeBookValue),
        Some(b) => Ratio::Value(price / b),
    }
}

/// PE over growth, growth in percent
pub fn peg_ratio(pe: Ratio, growth_pct: Option<f64>) -> Ratio {
    let Ratio::Value(pe) = pe else {
        return pe;
    };
    match growth_pct {
        None => Ratio::NotMeaningful(NotMeaningfulReason::MissingInput),
        Some(g) if g <= 0.0 => Ratio::NotMeaningful(NotMeaningfulReason::NonPositiveGrowth),
        Some(g) => Ratio::Value(pe / g),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `sqrt(22.5 * EPS * BVPS)` rounded to cents, only for positive inputs
pub fn graham_number(eps: f64, book_value_per_share: f64) -> Option<f64> {
    (eps > 0.0 && book_value_per_share > 0.0)
        .then(|| round2((GRAHAM_FACTOR * eps * book_value_per_share).sqrt()))
}

/// Positive when the price sits below fair value
pub fn discount_pct(fair_value: f64, price: f64) -> Option<f64> {
    (fair_value > 0.0).then(|| (fair_value - price) / fair_value * 100.0)
}

/// Compound annual growth of a yearly series, in percent
pub fn cagr_pct(series: &BTreeMap<i32, f64>) -> Option<f64> {
    let (&first_year, &first) = series.first_key_value()?;
    let (&last_year, &last) = series.last_key_value()?;
    let years = last_year - first_year;
    if years <= 0 || first <= 0.0 || last <= 0.0 {
        return None;
    }
    Some(((last / first).powf(1.0 / f64::from(years)) - 1.0) * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairValueMethod {
    Graham,
    EarningsMultiple,
}

impl FairValueMethod {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Graham => "Graham Number sqrt(22.5 × EPS × BVPS)",
            Self::EarningsMultiple => "EPS × 15 earnings multiple",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationData {
    pub symbol: String,
    pub current_price: f64,
    pub pe: Ratio,
    pub pb: Ratio,
    pub peg: Ratio,
    pub forward_pe: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub earnings_growth_pct: Option<f64>,
    pub fair_value: Option<f64>,
    pub fair_value_method: Option<FairValueMethod>,
    pub discount_pct: Option<f64>,
}

impl ValuationData {
    pub fn has_negative_earnings(&self) -> bool {
        self.eps.is_some_and(|e| e < 0.0)
            || self.pe == Ratio::NotMeaningful(NotMeaningfulReason::NegativeEarnings)
    }
}

/// Combine upstream multiples with the price into ratios and fair value
///
/// EPS and BVPS are backed out of PE and PB when the source only reports
/// the multiples.
pub fn valuation_from_parts(
    symbol: &str,
    price: f64,
    multiples: &ValuationMultiples,
    trends: Option<&FinancialTrends>,
) -> ValuationData {
    let eps = multiples
        .eps
        .or_else(|| multiples.pe_ratio.filter(|pe| *pe != 0.0).map(|pe| price / pe));
    let bvps = multiples
        .book_value_per_share
        .or_else(|| multiples.pb_ratio.filter(|pb| *pb > 0.0).map(|pb| price / pb));

    let pe = match multiples.pe_ratio {
        Some(reported) if reported > 0.0 && eps.is_some_and(|e| e > 0.0) => Ratio::Value(reported),
        _ => pe_ratio(price, eps),
    };
    let pb = match multiples.pb_ratio {
        Some(reported) if reported > 0.0 => Ratio::Value(reported),
        _ => pb_ratio(price, bvps),
    };

    let growth = trends.and_then(|t| cagr_pct(&t.net_income));
    let peg = match multiples.peg_ratio {
        Some(reported) if reported > 0.0 && pe.is_meaningful() => Ratio::Value(reported),
        _ => peg_ratio(pe, growth),
    };

    let (fair_value, method) = match (eps, bvps) {
        (Some(e), Some(b)) if graham_number(e, b).is_some() => {
            (graham_number(e, b), Some(FairValueMethod::Graham))
        }
        (Some(e), _) if e > 0.0 => (
            Some(round2(e * EARNINGS_MULTIPLE)),
            Some(FairValueMethod::EarningsMultiple),
        ),
        _ => (None, None),
    };

    ValuationData {
        symbol: symbol.to_string(),
        current_price: price,
        pe,
        pb,
        peg,
        forward_pe: multiples.forward_pe,
        eps,
        book_value_per_share: bvps,
        earnings_growth_pct: growth,
        discount_pct: fair_value.and_then(|fv| discount_pct(fv, price)),
        fair_value,
        fair_value_method: method,
    }
}

pub async fn fetch_valuation(
    data: &MarketData,
    symbol: &Symbol,
) -> Result<ValuationData, DimensionError> {
    let (profile, multiples, trends) = tokio::join!(
        data.profile(symbol),
        data.valuation(symbol),
        data.financial_trends(symbol)
    );

    let price = profile
        .map(|p| p.price)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| {
            DimensionError::DataUnavailable(format!("no price to value {symbol} against"))
        })?;
    let multiples = multiples.ok_or_else(|| {
        DimensionError::DataUnavailable(format!("no valuation multiples for {symbol}"))
    })?;

    Ok(valuation_from_parts(symbol.as_str(), price, &multiples, trends.as_ref()))
}
