//! LadderLab Runner — backtest orchestration, statistics, grid search, heatmaps.
//!
//! This crate sits between the pure core and the CLI:
//! - Runner: candles + `StrategyConfig` → scored trades, equity, statistics
//! - Metrics: per-run statistics and monthly breakdowns
//! - Fitness: objective metrics the optimizer maximizes
//! - Space: parameter ranges, search modes, lexicographic enumeration
//! - Optimizer: parallel grid search with a bounded progress stream
//! - Heatmap: dense two-parameter score matrix
//! - Data loading, TOML run files, exports, synthetic candles

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod heatmap;
pub mod metrics;
pub mod optimizer;
pub mod runner;
pub mod space;
pub mod synthetic;

pub use config::{OptimizerSection, RunFile, RunFileError};
pub use data_loader::{load_candles_csv, read_candles, write_candles_csv, LoadError};
pub use fitness::{ObjectiveMetric, FAILED_SCORE};
pub use heatmap::{run_heatmap, Heatmap};
pub use metrics::{PeriodStats, Statistics};
pub use optimizer::{
    event_channel, BacktestObjective, EvalFailure, EvalResult, Objective, OptimizationResult,
    OptimizationSummary, OptimizeError, Optimizer, OptimizerConfig, OptimizerEvent,
};
pub use runner::{run_backtest, run_backtest_with, BacktestResult, RunError, SCHEMA_VERSION};
pub use space::{ParamGroup, ParamKind, ParamRange, ParamSpace, ParamValue, ParamVector, SearchMode};
pub use synthetic::{random_walk, SyntheticConfig};
