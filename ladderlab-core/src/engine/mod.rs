//! Backtest engine — the position lifecycle simulator and its supporting pieces.

pub mod simulator;
pub mod stop_policy;

pub use simulator::{
    simulate, EquityPoint, SimulationContext, SimulationResult, Simulator,
};
pub use stop_policy::{relocate, relocation_target};

use thiserror::Error;

use crate::config::StrategyConfig;
use crate::domain::PositionError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("insufficient data: need at least {needed} candles, got {available}")]
    InsufficientData { needed: usize, available: usize },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<PositionError> for SimError {
    fn from(e: PositionError) -> Self {
        Self::InvariantViolation(e.to_string())
    }
}

/// Candles needed before the first signal can fire, plus one to act on it.
///
/// Enabled filters count: a filter still warming up would veto every entry.
pub fn required_candles(config: &StrategyConfig) -> usize {
    config.warmup() + 2
}

/// Reject series too short for the configured lookbacks.
pub fn check_history(available: usize, config: &StrategyConfig) -> Result<(), SimError> {
    let needed = required_candles(config);
    if available < needed {
        return Err(SimError::InsufficientData { needed, available });
    }
    Ok(())
}
