//! Backtest runner — wires together config, indicators, filters, simulator,
//! scorer, and statistics.
//!
//! Two entry points:
//! - `run_backtest()`: full pipeline with every trade scored. Used by the CLI.
//! - `run_backtest_with()`: scoring optional. The optimizer skips it since
//!   scores never change the ledger.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use ladderlab_core::config::{ConfigError, StrategyConfig};
use ladderlab_core::domain::{Candle, TradeRecord};
use ladderlab_core::engine::{check_history, required_candles, simulate, EquityPoint, SimError};
use ladderlab_core::filters::FilterChain;
use ladderlab_core::indicators::compute;
use ladderlab_core::scoring::{score_entry, ScorerConfig};

use crate::metrics::Statistics;

/// Errors from the runner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),
}

impl RunError {
    /// Too few candles for the lookbacks of this particular config.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::Simulation(SimError::InsufficientData { .. }))
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_hash: String,
    pub config: StrategyConfig,
    pub statistics: Statistics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub filtered_signals: usize,
    pub candle_count: usize,
    pub warmup_candles: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run the full pipeline and score every trade with the default scorer.
pub fn run_backtest(candles: &[Candle], config: &StrategyConfig) -> Result<BacktestResult, RunError> {
    run_backtest_with(candles, config, Some(&ScorerConfig::default()))
}

/// Run the full pipeline over pre-loaded candles. No I/O.
///
/// The config is validated before anything is computed; a series shorter than
/// the config's warm-up is rejected with `SimError::InsufficientData`.
pub fn run_backtest_with(
    candles: &[Candle],
    config: &StrategyConfig,
    scorer: Option<&ScorerConfig>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    if let Some(scorer) = scorer {
        scorer.validate()?;
    }
    check_history(candles.len(), config)?;

    let series = compute(candles, &config.indicators);
    let chain = FilterChain::from_configs(config.active_filters(), candles);
    let mut sim = simulate(candles, &series, &chain, &config.simulator)?;

    if let Some(scorer) = scorer {
        for trade in &mut sim.trades {
            trade.score = Some(score_entry(
                candles,
                &series,
                &chain,
                &config.indicators,
                scorer,
                trade.entry_index,
                trade.direction,
            ));
        }
    }

    let statistics = Statistics::compute(&sim);
    let config_hash = config.config_hash();
    let short_hash = config_hash.get(..12).unwrap_or(&config_hash);
    info!(
        config = short_hash,
        candles = candles.len(),
        trades = statistics.trade_count,
        return_pct = statistics.total_return_pct,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        config_hash,
        config: config.clone(),
        statistics,
        trades: sim.trades,
        equity_curve: sim.equity_curve,
        initial_capital: sim.initial_capital,
        final_equity: sim.final_equity,
        filtered_signals: sim.filtered_signals,
        candle_count: candles.len(),
        warmup_candles: required_candles(config),
    })
}
