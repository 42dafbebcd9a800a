//! Market-context inputs: trend strength, volatility regime, price levels.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::indicators::{defined, IndicatorSeries};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    /// |close − channel mid| / ATR.
    pub trend_strength: Option<f64>,
    /// Percent rank (0–100) of the current ATR among recent values.
    pub volatility_percentile: Option<f64>,
}

impl MarketContext {
    pub fn at(
        candles: &[Candle],
        series: &IndicatorSeries,
        index: usize,
        volatility_lookback: usize,
    ) -> Self {
        Self {
            trend_strength: trend_strength_ratio(candles, series, index),
            volatility_percentile: volatility_percentile(&series.atr, index, volatility_lookback),
        }
    }
}

pub fn trend_strength_ratio(
    candles: &[Candle],
    series: &IndicatorSeries,
    index: usize,
) -> Option<f64> {
    let close = candles.get(index)?.close;
    let mid = defined(&series.mid, index)?;
    let atr = defined(&series.atr, index).filter(|a| *a > 0.0)?;
    Some((close - mid).abs() / atr)
}

/// Share of defined values in the trailing window (current included) that
/// are ≤ the current value, in percent.
pub fn volatility_percentile(values: &[f64], index: usize, lookback: usize) -> Option<f64> {
    let current = defined(values, index)?;
    let start = (index + 1).saturating_sub(lookback.max(1));
    let window: Vec<f64> = values[start..=index]
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    let at_or_below = window.iter().filter(|&&v| v <= current).count();
    Some(at_or_below as f64 / window.len() as f64 * 100.0)
}

/// (support, resistance) = (lowest low, highest high) over the last
/// `lookback` candles of `history`.
pub fn support_resistance(history: &[Candle], lookback: usize) -> Option<(f64, f64)> {
    if history.is_empty() || lookback == 0 {
        return None;
    }
    let window = &history[history.len().saturating_sub(lookback)..];
    let support = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    Some((support, resistance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::indicators::{compute, make_candles, make_ohlc_candles};

    #[test]
    fn percentile_of_max_is_100() {
        let values = [f64::NAN, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(volatility_percentile(&values, 4, 10), Some(100.0));
        assert_eq!(volatility_percentile(&values, 2, 10), Some(100.0));
    }

    #[test]
    fn percentile_window_is_trailing() {
        let values = [5.0, 1.0, 2.0, 3.0, 2.0];
        // window [2, 3, 2]: two of three ≤ 2.
        let p = volatility_percentile(&values, 4, 3).unwrap();
        assert!((p - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(volatility_percentile(&values, 0, 3), Some(100.0));
    }

    #[test]
    fn percentile_undefined_current() {
        assert_eq!(volatility_percentile(&[1.0, f64::NAN], 1, 5), None);
    }

    #[test]
    fn levels_from_window() {
        let candles = make_ohlc_candles(&[
            (10.0, 20.0, 1.0, 10.0),
            (10.0, 12.0, 8.0, 11.0),
            (11.0, 13.0, 9.0, 12.0),
        ]);
        assert_eq!(support_resistance(&candles, 2), Some((8.0, 13.0)));
        assert_eq!(support_resistance(&candles, 10), Some((1.0, 20.0)));
        assert_eq!(support_resistance(&[], 10), None);
    }

    #[test]
    fn strength_ratio_needs_defined_series() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let series = compute(
            &candles,
            &IndicatorConfig {
                channel_period: 3,
                channel_multiplier: 1.0,
                atr_period: 3,
            },
        );
        assert!(trend_strength_ratio(&candles, &series, 1).is_none());
        let r = trend_strength_ratio(&candles, &series, 9).unwrap();
        assert!(r > 0.0);
    }
}
