//! Filter chain — composable vetoes on candidate entries.
//!
//! Each unit precomputes what it needs from the candles once per run
//! (`compute`), then answers allow/block per (index, direction). Units only
//! look at market data, never at positions.
//!
//! The chain evaluates units in insertion order and stops at the first
//! block. An empty chain allows everything.

pub mod momentum_bounds;
pub mod trend_confirmation;
pub mod trend_strength;
pub mod volume;

pub use momentum_bounds::MomentumBoundsFilter;
pub use trend_confirmation::TrendConfirmationFilter;
pub use trend_strength::TrendStrengthFilter;
pub use volume::VolumeFilter;

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::domain::{Candle, Direction};

/// Reason used by every unit when its series is still undefined.
pub const WARMUP_REASON: &str = "warm-up";

/// Verdict of a single unit, or of the chain as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub allowed: bool,
    /// Name of the unit that decided; `None` when the chain passed.
    pub filter: Option<String>,
    pub reason: String,
}

impl FilterDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            filter: None,
            reason: reason.into(),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            filter: None,
            reason: reason.into(),
        }
    }

    pub fn warmup() -> Self {
        Self::block(WARMUP_REASON)
    }

    fn from_unit(mut self, name: &str) -> Self {
        self.filter = Some(name.to_string());
        self
    }
}

/// Per-unit result used for confluence scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub name: String,
    pub allowed: bool,
    pub reason: String,
}

/// Capability every filter unit provides.
pub trait FilterUnit: Send + Sync {
    fn name(&self) -> &str;

    /// Precompute per-candle values. Called once before any `evaluate`.
    fn compute(&mut self, candles: &[Candle]);

    /// Allow or block an entry in `direction` at candle `index`.
    /// Must only use values at `index` or earlier.
    fn evaluate(&self, index: usize, direction: Direction) -> FilterDecision;
}

/// Build a unit from its config.
pub fn build(config: &FilterConfig) -> Box<dyn FilterUnit> {
    match *config {
        FilterConfig::TrendConfirmation { ema_period } => {
            Box::new(TrendConfirmationFilter::new(ema_period))
        }
        FilterConfig::MomentumBounds {
            rsi_period,
            overbought,
            oversold,
        } => Box::new(MomentumBoundsFilter::new(rsi_period, overbought, oversold)),
        FilterConfig::TrendStrength {
            adx_period,
            min_adx,
        } => Box::new(TrendStrengthFilter::new(adx_period, min_adx)),
        FilterConfig::VolumeConfirmation { ma_period } => Box::new(VolumeFilter::new(ma_period)),
    }
}

#[derive(Default)]
pub struct FilterChain {
    units: Vec<Box<dyn FilterUnit>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and precompute every unit against `candles`.
    pub fn from_configs<'a>(
        configs: impl IntoIterator<Item = &'a FilterConfig>,
        candles: &[Candle],
    ) -> Self {
        let mut chain = Self::new();
        for config in configs {
            chain.push(build(config));
        }
        chain.compute(candles);
        chain
    }

    pub fn push(&mut self, unit: Box<dyn FilterUnit>) {
        self.units.push(unit);
    }

    pub fn compute(&mut self, candles: &[Candle]) {
        for unit in &mut self.units {
            unit.compute(candles);
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// First blocking unit wins; otherwise allowed.
    pub fn allow(&self, index: usize, direction: Direction) -> FilterDecision {
        for unit in &self.units {
            let decision = unit.evaluate(index, direction);
            if !decision.allowed {
                return decision.from_unit(unit.name());
            }
        }
        FilterDecision::allow("all filters passed")
    }

    /// Every unit's verdict, no short-circuit.
    pub fn outcomes(&self, index: usize, direction: Direction) -> Vec<FilterOutcome> {
        self.units
            .iter()
            .map(|unit| {
                let decision = unit.evaluate(index, direction);
                FilterOutcome {
                    name: unit.name().to_string(),
                    allowed: decision.allowed,
                    reason: decision.reason,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("units", &self.names())
            .finish()
    }
}
