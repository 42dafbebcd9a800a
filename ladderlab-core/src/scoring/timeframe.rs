//! Higher-timeframe bias.
//!
//! Candles are grouped into buckets of `factor` consecutive candles from the
//! start of the history; the last bucket may be partial. Bias on a timeframe
//! is the side of the channel mid its latest close sits on.

use serde::{Deserialize, Serialize};

use super::ScorerConfig;
use crate::config::IndicatorConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{channel_lines, defined};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeAlignment {
    pub near: Option<Direction>,
    pub far: Option<Direction>,
}

impl TimeframeAlignment {
    /// Bias of the near (×`near_factor`) and far (×`far_factor`) tiers.
    pub fn evaluate(history: &[Candle], indicators: &IndicatorConfig, config: &ScorerConfig) -> Self {
        let tier = |factor: usize| {
            bias(
                &resample(history, factor),
                indicators.channel_period,
                indicators.channel_multiplier,
            )
        };
        Self {
            near: tier(config.near_factor),
            far: tier(config.far_factor),
        }
    }
}

/// Aggregate consecutive groups of `factor` candles into one.
pub fn resample(candles: &[Candle], factor: usize) -> Vec<Candle> {
    if factor <= 1 {
        return candles.to_vec();
    }
    candles
        .chunks(factor)
        .map(|group| {
            let first = &group[0];
            let last = &group[group.len() - 1];
            Candle {
                timestamp: first.timestamp,
                open: first.open,
                high: group.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max),
                low: group.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
                close: last.close,
                volume: group.iter().map(|c| c.volume).sum(),
            }
        })
        .collect()
}

/// Close above mid → long, below → short; undefined or exactly on mid → `None`.
pub fn bias(candles: &[Candle], channel_period: usize, multiplier: f64) -> Option<Direction> {
    let last = candles.len().checked_sub(1)?;
    let lines = channel_lines(candles, channel_period, multiplier);
    let mid = defined(&lines.mid, last)?;
    let close = candles[last].close;
    if close > mid {
        Some(Direction::Long)
    } else if close < mid {
        Some(Direction::Short)
    } else {
        None
    }
}
