//! Seeded random-walk candles for demos and tests.
//!
//! Clearly fake data: a drifting walk whose drift flips sign every
//! `regime_length` candles so the channel sees both up and down trends.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use ladderlab_core::domain::Candle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub candles: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Maximum absolute per-candle return, as a fraction.
    pub volatility: f64,
    /// Per-candle drift magnitude, as a fraction.
    pub drift: f64,
    pub regime_length: usize,
    pub interval_minutes: i64,
    pub start: DateTime<Utc>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            candles: 1000,
            seed: 42,
            start_price: 100.0,
            volatility: 0.01,
            drift: 0.002,
            regime_length: 60,
            interval_minutes: 60,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }
}

/// Generate `config.candles` sane, strictly time-ascending candles.
pub fn random_walk(config: &SyntheticConfig) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let regime = config.regime_length.max(1);
    let step = Duration::minutes(config.interval_minutes.max(1));

    let mut candles = Vec::with_capacity(config.candles);
    let mut price = config.start_price.max(0.01);
    let mut time = config.start;

    for i in 0..config.candles {
        let drift = if (i / regime) % 2 == 0 {
            config.drift
        } else {
            -config.drift
        };
        let noise = if config.volatility > 0.0 {
            rng.gen_range(-config.volatility..config.volatility)
        } else {
            0.0
        };
        let open = price;
        let close = (price * (1.0 + drift + noise)).max(0.01);
        let wick = config.volatility.max(1e-4) / 2.0;
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..wick));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..wick));
        let volume = rng.gen_range(500.0..5000.0);

        candles.push(Candle::new(time, open, high, low, close, volume));
        price = close;
        time += step;
    }

    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladderlab_core::domain::first_invalid_candle;

    #[test]
    fn candles_are_sane_and_ordered() {
        let candles = random_walk(&SyntheticConfig::default());
        assert_eq!(candles.len(), 1000);
        assert_eq!(first_invalid_candle(&candles), None);
    }

    #[test]
    fn same_seed_same_series() {
        let config = SyntheticConfig {
            candles: 50,
            ..SyntheticConfig::default()
        };
        assert_eq!(random_walk(&config), random_walk(&config));

        let other = SyntheticConfig { seed: 43, ..config.clone() };
        assert_ne!(random_walk(&config), random_walk(&other));
    }

    #[test]
    fn zero_candles() {
        let config = SyntheticConfig {
            candles: 0,
            ..SyntheticConfig::default()
        };
        assert!(random_walk(&config).is_empty());
    }
}
