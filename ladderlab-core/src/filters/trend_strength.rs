//! Trend strength — ADX must reach a minimum, regardless of direction.

use super::{FilterDecision, FilterUnit};
use crate::domain::{Candle, Direction};
use crate::indicators::{defined, Adx, Indicator};

#[derive(Debug, Clone)]
pub struct TrendStrengthFilter {
    adx: Adx,
    min_adx: f64,
    values: Vec<f64>,
}

impl TrendStrengthFilter {
    pub fn new(adx_period: usize, min_adx: f64) -> Self {
        Self {
            adx: Adx::new(adx_period),
            min_adx,
            values: Vec::new(),
        }
    }
}

impl FilterUnit for TrendStrengthFilter {
    fn name(&self) -> &str {
        "trend_strength"
    }

    fn compute(&mut self, candles: &[Candle]) {
        self.values = self.adx.compute(candles);
    }

    fn evaluate(&self, index: usize, _direction: Direction) -> FilterDecision {
        match defined(&self.values, index) {
            None => FilterDecision::warmup(),
            Some(adx) if adx >= self.min_adx => {
                FilterDecision::allow(format!("ADX {adx:.1} >= {}", self.min_adx))
            }
            Some(adx) => FilterDecision::block(format!("ADX {adx:.1} below {}", self.min_adx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, make_ohlc_candles};

    fn trending() -> Vec<Candle> {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 2.0).collect();
        make_candles(&closes)
    }

    #[test]
    fn strong_trend_passes() {
        let mut filter = TrendStrengthFilter::new(5, 25.0);
        filter.compute(&trending());
        assert!(filter.evaluate(39, Direction::Long).allowed);
        assert!(filter.evaluate(39, Direction::Short).allowed);
    }

    #[test]
    fn range_bound_market_blocks() {
        // Identical highs/lows: no directional movement at all.
        let data: Vec<(f64, f64, f64, f64)> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    (100.0, 102.0, 99.0, 101.0)
                } else {
                    (101.0, 102.0, 99.0, 100.0)
                }
            })
            .collect();
        let mut filter = TrendStrengthFilter::new(5, 10.0);
        filter.compute(&make_ohlc_candles(&data));
        let decision = filter.evaluate(39, Direction::Long);
        assert!(!decision.allowed);
        assert!(decision.reason.starts_with("ADX"));
    }

    #[test]
    fn warmup_blocks() {
        let mut filter = TrendStrengthFilter::new(5, 0.0);
        filter.compute(&trending());
        assert!(!filter.evaluate(3, Direction::Long).allowed);
    }
}
