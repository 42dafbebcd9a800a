//! Channel breakout generator with trend-reversal tracking.
//!
//! Per candle, in order:
//! 1. Trend exits: long trend clears when close < mid, short when close > mid.
//! 2. Long entry: close > upper, bullish body, no long trend active.
//!    Sets `in_long_trend`, clears `in_short_trend`.
//! 3. Short entry: close < lower, bearish body, no short trend active.
//!    Sets `in_short_trend`, clears `in_long_trend`.
//!
//! Undefined channel values at an index mean no signal and no state change.

use serde::{Deserialize, Serialize};

use super::Signal;
use crate::domain::{Candle, Direction};
use crate::indicators::IndicatorSeries;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendState {
    pub in_long_trend: bool,
    pub in_short_trend: bool,
}

impl TrendState {
    pub fn active(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.in_long_trend,
            Direction::Short => self.in_short_trend,
        }
    }

    fn enter(&mut self, direction: Direction) {
        self.in_long_trend = direction == Direction::Long;
        self.in_short_trend = direction == Direction::Short;
    }
}

/// Stateful per-run generator. Feed candles in order, once each.
#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    state: TrendState,
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrendState {
        self.state
    }

    /// Evaluate candle `index`. Must be called with increasing indices.
    pub fn step(&mut self, candles: &[Candle], series: &IndicatorSeries, index: usize) -> Signal {
        let Some(candle) = candles.get(index) else {
            return Signal::none(index, f64::NAN);
        };
        let Some((upper, mid, lower)) = series.channel_at(index) else {
            return Signal::none(index, candle.close);
        };
        let close = candle.close;

        if close < mid {
            self.state.in_long_trend = false;
        }
        if close > mid {
            self.state.in_short_trend = false;
        }

        let breakout = if close > upper && candle.is_bullish() {
            Some(Direction::Long)
        } else if close < lower && candle.is_bearish() {
            Some(Direction::Short)
        } else {
            None
        };

        let mut signal = Signal::none(index, close);
        if let Some(direction) = breakout {
            if self.state.active(direction) {
                signal.reentry = Some(direction);
            } else {
                self.state.enter(direction);
                signal.direction = Some(direction);
            }
        }
        signal
    }
}

/// Run a fresh generator over the whole series.
pub fn generate(candles: &[Candle], series: &IndicatorSeries) -> Vec<Signal> {
    let mut generator = SignalGenerator::new();
    (0..candles.len())
        .map(|i| generator.step(candles, series, i))
        .collect()
}
