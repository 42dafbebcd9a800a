//! Volatility-normalized trend channel.
//!
//! mid   = SMA(typical price, period)
//! range = SMA(high - low, period), current candle included
//! upper = mid + multiplier * range
//! lower = mid - multiplier * range
//!
//! First valid value at index period-1.

use super::sma::sma_of_series;
use super::Indicator;
use crate::domain::Candle;

/// Which line of the channel an `Indicator` instance reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBand {
    Upper,
    Middle,
    Lower,
}

/// All three channel lines, aligned with the input candles.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLines {
    pub upper: Vec<f64>,
    pub mid: Vec<f64>,
    pub lower: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TrendChannel {
    period: usize,
    multiplier: f64,
    band: ChannelBand,
    name: String,
}

impl TrendChannel {
    pub fn new(period: usize, multiplier: f64, band: ChannelBand) -> Self {
        assert!(period >= 1, "channel period must be >= 1");
        let suffix = match band {
            ChannelBand::Upper => "upper",
            ChannelBand::Middle => "mid",
            ChannelBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("channel_{suffix}_{period}_{multiplier}"),
        }
    }

    /// Compute all three lines in one pass over the candles.
    pub fn lines(&self, candles: &[Candle]) -> ChannelLines {
        channel_lines(candles, self.period, self.multiplier)
    }
}

pub fn channel_lines(candles: &[Candle], period: usize, multiplier: f64) -> ChannelLines {
    let typical: Vec<f64> = candles.iter().map(Candle::typical_price).collect();
    let ranges: Vec<f64> = candles.iter().map(Candle::range).collect();
    let mid = sma_of_series(&typical, period);
    let range = sma_of_series(&ranges, period);

    let upper = mid
        .iter()
        .zip(&range)
        .map(|(m, r)| m + multiplier * r)
        .collect();
    let lower = mid
        .iter()
        .zip(&range)
        .map(|(m, r)| m - multiplier * r)
        .collect();

    ChannelLines { upper, mid, lower }
}

impl Indicator for TrendChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let lines = self.lines(candles);
        match self.band {
            ChannelBand::Upper => lines.upper,
            ChannelBand::Middle => lines.mid,
            ChannelBand::Lower => lines.lower,
        }
    }
}
