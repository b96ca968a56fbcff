//! Candlestick pattern detection on daily OHLCV bars
//!
//! All detectors are pure and produce plain-English lines meant to be
//! pasted into a prompt.

use crate::api::Candle;
use crate::config::Thresholds;
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

const NO_PATTERNS: &str = "No notable candlestick patterns detected.";

/// Aggregated candlestick findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlestickSummary {
    pub notable_candles: Vec<String>,
    pub gap_events: Vec<String>,
    pub volume_spikes: Vec<String>,
    pub selling_pressure: Vec<String>,
    pub buying_pressure: Vec<String>,
}

impl CandlestickSummary {
    pub fn is_empty(&self) -> bool {
        self.notable_candles.is_empty()
            && self.gap_events.is_empty()
            && self.volume_spikes.is_empty()
            && self.selling_pressure.is_empty()
            && self.buying_pressure.is_empty()
    }

    pub fn to_text(&self) -> String {
        let sections: Vec<String> = [
            ("Notable Candles", &self.notable_candles),
            ("Gap Events", &self.gap_events),
            ("Volume Spikes", &self.volume_spikes),
            ("Selling Pressure", &self.selling_pressure),
            ("Buying Pressure", &self.buying_pressure),
        ]
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(title, lines)| {
            let bullets: Vec<String> = lines.iter().map(|l| format!("  • {l}")).collect();
            format!("**{title}:**\n{}", bullets.join("\n"))
        })
        .collect();

        if sections.is_empty() {
            NO_PATTERNS.to_string()
        } else {
            sections.join("\n")
        }
    }
}

/// Run every detector
pub fn analyse(candles: &[Candle], thresholds: &Thresholds) -> CandlestickSummary {
    if candles.is_empty() {
        return CandlestickSummary::default();
    }

    let (selling_pressure, buying_pressure) = consecutive_pressure(candles, thresholds.streak_min);

    CandlestickSummary {
        notable_candles: notable_candles(
            candles,
            thresholds.candle_body_pct,
            thresholds.candle_top_n,
        ),
        gap_events: gaps(candles, thresholds.gap_pct),
        volume_spikes: volume_spikes(
            candles,
            thresholds.volume_spike_multiplier,
            thresholds.volume_window,
        ),
        selling_pressure,
        buying_pressure,
    }
}

fn body_pct(candle: &Candle) -> Option<f64> {
    (candle.open != 0.0).then(|| (candle.close - candle.open) / candle.open * 100.0)
}

/// Largest bodies first, at most `top_n`
pub fn notable_candles(candles: &[Candle], min_body_pct: f64, top_n: usize) -> Vec<String> {
    let mut found: Vec<(f64, String)> = candles
        .iter()
        .filter_map(|c| {
            let body = body_pct(c)?;
            (body.abs() >= min_body_pct).then(|| {
                let direction = if body > 0.0 { "bullish (green)" } else { "bearish (red)" };
                (
                    body.abs(),
                    format!(
                        "{}: Large {direction} candle, O:{:.2} H:{:.2} L:{:.2} C:{:.2} ({body:+.1}%)",
                        c.date.format("%Y-%m-%d"),
                        c.open,
                        c.high,
                        c.low,
                        c.close
                    ),
                )
            })
        })
        .collect();

    found.sort_by(|a, b| b.0.total_cmp(&a.0));
    found.into_iter().take(top_n).map(|(_, line)| line).collect()
}

/// Opens that jump away from the previous close
pub fn gaps(candles: &[Candle], min_gap_pct: f64) -> Vec<String> {
    candles
        .windows(2)
        .filter_map(|w| {
            let (prev, today) = (&w[0], &w[1]);
            if prev.close == 0.0 {
                return None;
            }
            let gap = (today.open - prev.close) / prev.close * 100.0;
            (gap.abs() >= min_gap_pct).then(|| {
                let direction = if gap > 0.0 { "gap-UP" } else { "gap-DOWN" };
                format!(
                    "{}: {direction} of {gap:+.1}% (prev close {:.2} → open {:.2})",
                    today.date.format("%Y-%m-%d"),
                    prev.close,
                    today.open
                )
            })
        })
        .collect()
}

/// Days trading at least `multiplier` times the rolling average volume
///
/// The average includes the day itself and only days with a full window
/// behind them are considered.
pub fn volume_spikes(candles: &[Candle], multiplier: f64, window: usize) -> Vec<String> {
    if candles.iter().all(|c| c.volume <= 0.0) {
        return Vec::new();
    }
    let Ok(mut sma) = SimpleMovingAverage::new(window.max(1)) else {
        return Vec::new();
    };

    let mut spikes = Vec::new();
    for (i, candle) in candles.iter().enumerate() {
        let avg = sma.next(candle.volume);
        if i < window || avg <= 0.0 {
            continue;
        }

        let ratio = candle.volume / avg;
        if ratio >= multiplier {
            let prev_close = candles[i - 1].close;
            let change = if prev_close > 0.0 {
                format!(", price {:+.1}%", (candle.close - prev_close) / prev_close * 100.0)
            } else {
                String::new()
            };
            spikes.push(format!(
                "{}: Volume spike {ratio:.1}x average ({:.0} vs avg {avg:.0}{change})",
                candle.date.format("%Y-%m-%d"),
                candle.volume
            ));
        }
    }

    spikes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Bear,
    Bull,
}

struct Streak {
    side: Side,
    start: usize,
    len: usize,
    cumulative_pct: f64,
}

/// Runs of same-direction candles, as (selling, buying)
pub fn consecutive_pressure(candles: &[Candle], min_streak: usize) -> (Vec<String>, Vec<String>) {
    let mut selling = Vec::new();
    let mut buying = Vec::new();
    let mut current: Option<Streak> = None;

    let mut flush = |streak: Option<Streak>| {
        let Some(s) = streak else { return };
        if s.len < min_streak {
            return;
        }
        let line = format!(
            "{} to {}: {} consecutive {} candles (cumulative {:+.1}%)",
            candles[s.start].date.format("%Y-%m-%d"),
            candles[s.start + s.len - 1].date.format("%Y-%m-%d"),
            s.len,
            if s.side == Side::Bear { "bearish" } else { "bullish" },
            s.cumulative_pct
        );
        match s.side {
            Side::Bear => selling.push(line),
            Side::Bull => buying.push(line),
        }
    };

    for (i, candle) in candles.iter().enumerate() {
        let Some(day_pct) = body_pct(candle) else {
            flush(current.take());
            continue;
        };
        let side = if candle.close < candle.open { Side::Bear } else { Side::Bull };

        match current.as_mut() {
            Some(streak) if streak.side == side => {
                streak.len += 1;
                streak.cumulative_pct += day_pct;
            }
            _ => {
                flush(current.take());
                current = Some(Streak {
                    side,
                    start: i,
                    len: 1,
                    cumulative_pct: day_pct,
                });
            }
        }
    }
    flush(current.take());

    (selling, buying)
}
