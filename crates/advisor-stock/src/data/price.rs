//! Price snapshot and catalyst detection

use super::MarketData;
use crate::api::StockProfile;
use crate::config::Thresholds;
use crate::domain::Symbol;
use crate::error::DimensionError;
use serde::{Deserialize, Serialize};

/// Current price in the context of its 52-week range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub symbol: String,
    pub company_name: Option<String>,
    pub currency: String,
    pub current_price: f64,
    pub previous_close: Option<f64>,
    pub week_high_52: Option<f64>,
    pub week_low_52: Option<f64>,
    /// 0.0 at the 52-week low, 1.0 at the high
    pub range_position: Option<f64>,
    pub day_change_pct: Option<f64>,
    pub dividend_yield_pct: Option<f64>,
    pub is_reit: bool,
    pub catalysts: Vec<String>,
}

/// `(current - low) / (high - low)`, `None` for a missing or flat range
pub fn range_position(current: f64, low: Option<f64>, high: Option<f64>) -> Option<f64> {
    let (low, high) = (low?, high?);
    let range = high - low;
    (range > 0.0).then(|| (current - low) / range)
}

pub fn day_change_pct(current: f64, previous_close: Option<f64>) -> Option<f64> {
    let prev = previous_close.filter(|p| *p > 0.0)?;
    Some((current - prev) / prev * 100.0)
}

/// Likely price drivers inferred from the profile
pub fn detect_catalysts(profile: &StockProfile, t: &Thresholds) -> Vec<String> {
    let mut catalysts = Vec::new();
    let price = profile.price;
    let yield_pct = profile.dividend_yield_pct.unwrap_or(0.0);
    // a flat range is treated as mid-range
    let range_pct = range_position(price, profile.week_low_52, profile.week_high_52)
        .map_or(50.0, |p| p * 100.0);

    if yield_pct >= t.catalyst_yield_pct && range_pct >= t.catalyst_range_pct {
        if profile.is_reit {
            catalysts.push(format!(
                "REIT with {yield_pct:.1}% dividend yield trading in the upper portion of its \
                 52-week range. Price is likely driven by investors accumulating shares ahead of \
                 the next dividend payout (dividend play). Philippine REITs distribute dividends \
                 quarterly."
            ));
        } else {
            catalysts.push(format!(
                "High-dividend stock ({yield_pct:.1}% yield) trading near its 52-week high. The \
                 upward move may be driven by investors buying ahead of an expected dividend \
                 declaration."
            ));
        }
    }

    if let Some(change) = day_change_pct(price, profile.previous_close) {
        if change >= t.catalyst_day_change_pct && yield_pct >= t.catalyst_yield_pct {
            catalysts.push(format!(
                "Price rose {change:.2}% from the previous close, which may reflect continued \
                 demand from dividend-seeking investors."
            ));
        }
    }

    if let Some(high) = profile.week_high_52.filter(|h| *h > 0.0) {
        let gap_to_high = (high - price) / high * 100.0;
        if gap_to_high < t.near_extreme_pct {
            catalysts.push(format!(
                "Price is within {:.1}% of its 52-week high (₱{high:.2}), indicating strong \
                 buying pressure.",
                gap_to_high.max(0.0)
            ));
        }
    }

    if let Some(low) = profile.week_low_52.filter(|l| *l > 0.0) {
        let gap_to_low = (price - low) / low * 100.0;
        if gap_to_low < t.near_extreme_pct {
            catalysts.push(format!(
                "Price is within {:.1}% of its 52-week low (₱{low:.2}), indicating sustained \
                 selling pressure.",
                gap_to_low.max(0.0)
            ));
        }
    }

    catalysts
}

pub fn price_from_profile(profile: &StockProfile, t: &Thresholds) -> PriceData {
    PriceData {
        symbol: profile.symbol.clone(),
        company_name: profile.company_name.clone(),
        currency: profile.currency.clone(),
        current_price: profile.price,
        previous_close: profile.previous_close,
        week_high_52: profile.week_high_52,
        week_low_52: profile.week_low_52,
        range_position: range_position(profile.price, profile.week_low_52, profile.week_high_52),
        day_change_pct: day_change_pct(profile.price, profile.previous_close),
        dividend_yield_pct: profile.dividend_yield_pct,
        is_reit: profile.is_reit,
        catalysts: detect_catalysts(profile, t),
    }
}

pub async fn fetch_price(
    data: &MarketData,
    symbol: &Symbol,
    thresholds: &Thresholds,
) -> Result<PriceData, DimensionError> {
    let profile = data
        .profile(symbol)
        .await
        .filter(|p| p.price > 0.0)
        .ok_or_else(|| DimensionError::DataUnavailable(format!("no price quote for {symbol}")))?;

    Ok(price_from_profile(&profile, thresholds))
}
