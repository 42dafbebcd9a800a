//! Momentum bounds — RSI must not sit in the zone that opposes the trade.
//!
//! Longs are blocked when RSI >= overbought, shorts when RSI <= oversold.

use super::{FilterDecision, FilterUnit};
use crate::domain::{Candle, Direction};
use crate::indicators::{defined, Indicator, Rsi};

#[derive(Debug, Clone)]
pub struct MomentumBoundsFilter {
    rsi: Rsi,
    overbought: f64,
    oversold: f64,
    values: Vec<f64>,
}

impl MomentumBoundsFilter {
    pub fn new(rsi_period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            rsi: Rsi::new(rsi_period),
            overbought,
            oversold,
            values: Vec::new(),
        }
    }
}

impl FilterUnit for MomentumBoundsFilter {
    fn name(&self) -> &str {
        "momentum_bounds"
    }

    fn compute(&mut self, candles: &[Candle]) {
        self.values = self.rsi.compute(candles);
    }

    fn evaluate(&self, index: usize, direction: Direction) -> FilterDecision {
        let Some(rsi) = defined(&self.values, index) else {
            return FilterDecision::warmup();
        };

        match direction {
            Direction::Long if rsi >= self.overbought => {
                FilterDecision::block(format!("RSI {rsi:.1} overbought (>= {})", self.overbought))
            }
            Direction::Short if rsi <= self.oversold => {
                FilterDecision::block(format!("RSI {rsi:.1} oversold (<= {})", self.oversold))
            }
            _ => FilterDecision::allow(format!("RSI {rsi:.1} within bounds")),
        }
    }
}
