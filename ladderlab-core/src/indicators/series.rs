//! Precomputed indicator series for one run.
//!
//! Built once from the candles and the indicator config, read-only afterwards.

use super::atr::Atr;
use super::channel::channel_lines;
use super::Indicator;
use crate::config::IndicatorConfig;
use crate::domain::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub upper: Vec<f64>,
    pub mid: Vec<f64>,
    pub lower: Vec<f64>,
    pub atr: Vec<f64>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.mid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mid.is_empty()
    }

    /// Look up a series by name ("upper", "mid", "lower", "atr").
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        match name {
            "upper" => Some(&self.upper),
            "mid" => Some(&self.mid),
            "lower" => Some(&self.lower),
            "atr" => Some(&self.atr),
            _ => None,
        }
    }

    /// Defined value of a named series at `index`. `None` for undefined
    /// (warm-up), out-of-range or unknown names.
    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.series(name).and_then(|s| defined(s, index))
    }

    /// Channel (upper, mid, lower) at `index`, if all three are defined.
    pub fn channel_at(&self, index: usize) -> Option<(f64, f64, f64)> {
        Some((
            defined(&self.upper, index)?,
            defined(&self.mid, index)?,
            defined(&self.lower, index)?,
        ))
    }
}

/// `values[index]` unless it is NaN or out of range.
pub fn defined(values: &[f64], index: usize) -> Option<f64> {
    values.get(index).copied().filter(|v| !v.is_nan())
}

/// Compute every core series. Pure and deterministic.
pub fn compute(candles: &[Candle], config: &IndicatorConfig) -> IndicatorSeries {
    let lines = channel_lines(candles, config.channel_period, config.channel_multiplier);
    IndicatorSeries {
        upper: lines.upper,
        mid: lines.mid,
        lower: lines.lower,
        atr: Atr::new(config.atr_period).compute(candles),
    }
}
