//! Indicator engine.
//!
//! Every indicator is a pure function: candle history in, numeric series out,
//! same length as the input. Entries before the window is full are
//! `f64::NAN` ("undefined"). No value at index t depends on candles after t.

pub mod adx;
pub mod atr;
pub mod channel;
pub mod ema;
pub mod rsi;
pub mod series;
pub mod sma;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use channel::{channel_lines, ChannelBand, ChannelLines, TrendChannel};
pub use ema::{ema_of_series, Ema};
pub use rsi::Rsi;
pub use series::{compute, defined, IndicatorSeries};
pub use sma::{sma_of_series, Sma, VolumeSma};

use crate::domain::Candle;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No indicator value at index t may depend on candles t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first defined output value.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Create synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                base + chrono::Duration::hours(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Build candles from (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Candle::new(base + chrono::Duration::hours(i as i64), open, high, low, close, 1000.0)
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
