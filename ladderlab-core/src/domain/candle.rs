//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for one fixed time interval.
///
/// Candles are immutable once ingested. A series is ordered by `timestamp`
/// (strictly ascending, unique).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLCV sanity: finite positive prices, `low <= {open, close} <= high`,
    /// finite volume >= 0.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.open > 0.0
            && self.close > 0.0
            && self.low > 0.0
            && self.high >= self.low
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= 0.0
    }

    /// Close above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Full candle range, inclusive of both extremes.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Check that a series is strictly time-ascending and every candle is sane.
///
/// Returns the index of the first offending candle.
pub fn first_invalid_candle(candles: &[Candle]) -> Option<usize> {
    for (i, candle) in candles.iter().enumerate() {
        if !candle.is_sane() {
            return Some(i);
        }
        if i > 0 && candle.timestamp <= candles[i - 1].timestamp {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            100.0,
            105.0,
            98.0,
            103.0,
            50_000.0,
        )
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_high_below_close_is_insane() {
        let mut c = sample_candle();
        c.high = 102.0;
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_negative_volume_is_insane() {
        let mut c = sample_candle();
        c.volume = -1.0;
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_infinite_values_are_insane() {
        let mut c = sample_candle();
        c.high = f64::INFINITY;
        assert!(!c.is_sane());

        let mut c = sample_candle();
        c.volume = f64::INFINITY;
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_body_direction() {
        let c = sample_candle();
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
    }

    #[test]
    fn typical_price_and_range() {
        let c = sample_candle();
        assert!((c.typical_price() - (105.0 + 98.0 + 103.0) / 3.0).abs() < 1e-12);
        assert!((c.range() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_timestamp_is_flagged() {
        let a = sample_candle();
        let b = sample_candle();
        assert_eq!(first_invalid_candle(&[a, b]), Some(1));
    }

    #[test]
    fn ordered_series_passes() {
        let a = sample_candle();
        let mut b = sample_candle();
        b.timestamp = a.timestamp + chrono::Duration::hours(1);
        assert_eq!(first_invalid_candle(&[a, b]), None);
    }
}
