//! Trend confirmation — trade direction must agree with an EMA.
//!
//! Long passes when close > EMA, short when close < EMA.

use super::{FilterDecision, FilterUnit};
use crate::domain::{Candle, Direction};
use crate::indicators::{defined, Ema, Indicator};

#[derive(Debug, Clone)]
pub struct TrendConfirmationFilter {
    ema: Ema,
    closes: Vec<f64>,
    values: Vec<f64>,
}

impl TrendConfirmationFilter {
    pub fn new(ema_period: usize) -> Self {
        Self {
            ema: Ema::new(ema_period),
            closes: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl FilterUnit for TrendConfirmationFilter {
    fn name(&self) -> &str {
        "trend_confirmation"
    }

    fn compute(&mut self, candles: &[Candle]) {
        self.closes = candles.iter().map(|c| c.close).collect();
        self.values = self.ema.compute(candles);
    }

    fn evaluate(&self, index: usize, direction: Direction) -> FilterDecision {
        let (Some(close), Some(ema)) = (defined(&self.closes, index), defined(&self.values, index))
        else {
            return FilterDecision::warmup();
        };

        let agrees = match direction {
            Direction::Long => close > ema,
            Direction::Short => close < ema,
        };
        if agrees {
            FilterDecision::allow(format!(
                "close {close:.4} on {} side of EMA {ema:.4}",
                direction.label()
            ))
        } else {
            FilterDecision::block(format!("close {close:.4} against EMA {ema:.4}"))
        }
    }
}
