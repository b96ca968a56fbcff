//! Return series statistics over daily closes

use crate::api::Candle;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::StandardDeviation;

/// Prior returns needed before a day can be judged a spike
pub const MIN_SPIKE_HISTORY: usize = 5;

/// Simple daily returns as fractions, one per consecutive pair of closes
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter_map(|w| (w[0] != 0.0).then(|| (w[1] - w[0]) / w[0]))
        .collect()
}

/// Dated returns, keyed by the later day of each pair
pub fn dated_returns(candles: &[Candle]) -> Vec<(NaiveDate, f64)> {
    candles
        .windows(2)
        .filter_map(|w| {
            (w[0].close != 0.0).then(|| (w[1].date, (w[1].close - w[0].close) / w[0].close))
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1), `None` below two observations
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Largest peak-to-trough decline in percent (zero or negative)
pub fn max_drawdown_pct(closes: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;

    for &close in closes {
        peak = peak.max(close);
        if peak > 0.0 {
            worst = worst.min((close - peak) / peak * 100.0);
        }
    }

    worst
}

/// Whether a daily return is abnormal against a rolling standard deviation
pub fn is_spike(daily_return: f64, rolling_std: f64, multiplier: f64, min_abs_return: f64) -> bool {
    let magnitude = daily_return.abs();
    magnitude > multiplier * rolling_std && magnitude >= min_abs_return
}

/// A day whose move stood out from the preceding window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSpike {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub rolling_std: f64,
}

impl PriceSpike {
    pub fn describe(&self) -> String {
        let direction = if self.daily_return > 0.0 { "spike up" } else { "spike down" };
        format!(
            "{}: {direction} of {:.1}%",
            self.date.format("%Y-%m-%d"),
            self.daily_return * 100.0
        )
    }
}

/// Flag returns that exceed `multiplier` times the standard deviation of
/// the previous `window` returns
///
/// The day under test is not part of its own baseline, and nothing is
/// flagged until [`MIN_SPIKE_HISTORY`] returns have been seen.
pub fn detect_spikes(
    returns: &[(NaiveDate, f64)],
    window: usize,
    multiplier: f64,
    min_abs_return: f64,
) -> Vec<PriceSpike> {
    let Ok(mut rolling) = StandardDeviation::new(window.max(2)) else {
        return Vec::new();
    };

    let mut spikes = Vec::new();
    let mut baseline: Option<f64> = None;

    for (seen, &(date, ret)) in returns.iter().enumerate() {
        if seen >= MIN_SPIKE_HISTORY {
            if let Some(std) = baseline {
                if is_spike(ret, std, multiplier, min_abs_return) {
                    spikes.push(PriceSpike {
                        date,
                        daily_return: ret,
                        rolling_std: std,
                    });
                }
            }
        }
        baseline = Some(rolling.next(ret));
    }

    spikes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    #[test]
    fn test_spike_threshold() {
        assert!(is_spike(0.09, 0.02, 3.0, 0.05));
        assert!(!is_spike(0.045, 0.02, 3.0, 0.05));
        assert!(is_spike(-0.09, 0.02, 3.0, 0.05));
        // big relative move but below the absolute floor
        assert!(!is_spike(0.04, 0.001, 3.0, 0.05));
    }

    #[test]
    fn test_daily_returns() {
        let returns = daily_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] + 0.10).abs() < 1e-12);
        assert!(daily_returns(&[0.0, 5.0]).is_empty());
    }

    #[test]
    fn test_std_dev_is_sample() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown_pct(&[100.0, 120.0, 90.0, 130.0, 117.0]), -25.0);
        assert_eq!(max_drawdown_pct(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    #[test]
    fn test_detect_spikes_uses_prior_window() {
        // alternating +-1% baseline, std of about 0.01
        let mut returns: Vec<(NaiveDate, f64)> = (0..20)
            .map(|i| (day(i), if i % 2 == 0 { 0.01 } else { -0.01 }))
            .collect();
        returns.push((day(20), 0.09));
        returns.push((day(21), 0.045));

        let spikes = detect_spikes(&returns, 20, 3.0, 0.05);
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].date, day(20));
        assert!((spikes[0].rolling_std - 0.01).abs() < 1e-9);
        assert_eq!(spikes[0].describe(), "2024-01-21: spike up of 9.0%");
    }

    #[test]
    fn test_detect_spikes_needs_history() {
        let returns = vec![(day(0), 0.0), (day(1), 0.0), (day(2), 0.5)];
        assert!(detect_spikes(&returns, 20, 3.0, 0.05).is_empty());
    }
}
