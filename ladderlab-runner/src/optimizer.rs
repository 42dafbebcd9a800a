//! Grid-search optimizer — parallel evaluation of a parameter space.
//!
//! Workers on a private Rayon pool pull enumeration indices from a shared
//! atomic cursor, so every vector is evaluated at most once. The best slot is
//! a mutex updated on a strictly greater score, or an equal score with a
//! smaller enumeration index; the final best is therefore independent of
//! worker count and completion order.
//!
//! Progress is streamed on a bounded `std::sync::mpsc::sync_channel`:
//! `Start`, then one `Progress` or `Error` per completed vector, then `Done`.
//! A full channel blocks workers until the caller drains it; a dropped
//! receiver stops the search like a cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ladderlab_core::config::{ConfigError, StrategyConfig};
use ladderlab_core::domain::Candle;

use crate::fitness::{ObjectiveMetric, FAILED_SCORE};
use crate::metrics::Statistics;
use crate::runner::{run_backtest_with, RunError};
use crate::space::{ParamSpace, ParamVector, SearchMode};

/// Errors that reject a search before any vector is evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("invalid range for '{name}': {reason}")]
    InvalidRange { name: String, reason: String },
    #[error("empty search space: {0}")]
    EmptySpace(String),
    #[error("invalid base config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

// ─── Results ────────────────────────────────────────────────────────

/// One evaluated parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Enumeration index. Set by the optimizer.
    #[serde(default)]
    pub index: usize,
    pub params: ParamVector,
    pub score: f64,
    pub statistics: Statistics,
}

impl OptimizationResult {
    pub fn new(params: ParamVector, score: f64, statistics: Statistics) -> Self {
        Self {
            index: 0,
            params,
            score,
            statistics,
        }
    }

    /// Result carrying only a score, for objectives without a backtest behind them.
    pub fn scored(params: ParamVector, score: f64) -> Self {
        Self::new(params, score, Statistics::empty())
    }

    /// Whether `self` should replace `other` as the best result.
    fn beats(&self, other: &OptimizationResult) -> bool {
        self.score > other.score || (self.score == other.score && self.index < other.index)
    }
}

/// Why a single vector could not be scored. Never aborts the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalFailure {
    pub message: String,
    /// Too few candles for this vector's lookbacks.
    pub insufficient_data: bool,
}

impl EvalFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            insufficient_data: false,
        }
    }
}

impl From<RunError> for EvalFailure {
    fn from(e: RunError) -> Self {
        Self {
            insufficient_data: e.is_insufficient_data(),
            message: e.to_string(),
        }
    }
}

impl From<ConfigError> for EvalFailure {
    fn from(e: ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

// ─── Objective ──────────────────────────────────────────────────────

pub type EvalResult = Result<OptimizationResult, EvalFailure>;

/// Black-box function the optimizer maximizes.
pub trait Objective: Sync {
    fn evaluate(&self, params: &ParamVector) -> EvalResult;
}

impl<F> Objective for F
where
    F: Fn(&ParamVector) -> EvalResult + Sync,
{
    fn evaluate(&self, params: &ParamVector) -> EvalResult {
        self(params)
    }
}

/// Runs the full backtest pipeline for each vector applied over a base config.
pub struct BacktestObjective<'a> {
    candles: &'a [Candle],
    base: StrategyConfig,
    metric: ObjectiveMetric,
}

impl<'a> BacktestObjective<'a> {
    /// Fails if the base config itself is invalid.
    pub fn new(
        candles: &'a [Candle],
        base: StrategyConfig,
        metric: ObjectiveMetric,
    ) -> Result<Self, OptimizeError> {
        base.validate()?;
        Ok(Self {
            candles,
            base,
            metric,
        })
    }

    pub fn metric(&self) -> ObjectiveMetric {
        self.metric
    }

    /// The config a vector evaluates to.
    pub fn config_for(&self, params: &ParamVector) -> Result<StrategyConfig, ConfigError> {
        StrategyConfig::from_pairs(&self.base, params.pairs())
    }
}

impl Objective for BacktestObjective<'_> {
    fn evaluate(&self, params: &ParamVector) -> EvalResult {
        let config = self.config_for(params)?;
        let result = run_backtest_with(self.candles, &config, None)?;
        let score = self.metric.score(&result.statistics);
        Ok(OptimizationResult::new(params.clone(), score, result.statistics))
    }
}

// ─── Events ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OptimizerEvent {
    Start {
        total: usize,
        workers: usize,
    },
    Progress {
        index: usize,
        completed: usize,
        total: usize,
        params: ParamVector,
        score: f64,
        is_new_best: bool,
    },
    Error {
        index: usize,
        params: ParamVector,
        message: String,
    },
    Done {
        best: Option<OptimizationResult>,
        evaluated: usize,
        failed: usize,
        cancelled: bool,
    },
}

/// Bounded event channel of the given capacity (at least 1).
pub fn event_channel(capacity: usize) -> (SyncSender<OptimizerEvent>, Receiver<OptimizerEvent>) {
    sync_channel(capacity.max(1))
}

// ─── Configuration ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Worker threads; 0 uses the available parallelism.
    pub workers: usize,
    pub metric: ObjectiveMetric,
    pub mode: SearchMode,
    /// Most recent results kept in the summary.
    pub recent_window: usize,
    /// Capacity of the channel returned by [`Optimizer::channel`].
    pub channel_capacity: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            metric: ObjectiveMetric::default(),
            mode: SearchMode::default(),
            recent_window: 20,
            channel_capacity: 256,
        }
    }
}

/// Final state of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub total: usize,
    pub workers: usize,
    /// Vectors completed, successful or not.
    pub evaluated: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub best: Option<OptimizationResult>,
    /// Last `recent_window` successful results, oldest first.
    pub recent: Vec<OptimizationResult>,
}

// ─── Optimizer ──────────────────────────────────────────────────────

pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn channel(&self) -> (SyncSender<OptimizerEvent>, Receiver<OptimizerEvent>) {
        event_channel(self.config.channel_capacity)
    }

    /// Effective pool size for a space of `total` vectors.
    pub fn worker_count(&self, total: usize) -> usize {
        let requested = if self.config.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.config.workers
        };
        requested.min(total).max(1)
    }

    /// Evaluate every vector of `space`, or until `cancel` is raised.
    ///
    /// Workers finish their current evaluation and check `cancel` before
    /// dequeuing the next index.
    pub fn run<O: Objective + ?Sized>(
        &self,
        space: &ParamSpace,
        objective: &O,
        events: Option<&SyncSender<OptimizerEvent>>,
        cancel: Option<&AtomicBool>,
    ) -> Result<OptimizationSummary, OptimizeError> {
        self.drive(space, objective, events, cancel, None)
    }

    /// Shared engine for grid search and heatmaps. When `cells` is given, each
    /// successful score is written at its enumeration index.
    pub(crate) fn drive<O: Objective + ?Sized>(
        &self,
        space: &ParamSpace,
        objective: &O,
        events: Option<&SyncSender<OptimizerEvent>>,
        cancel: Option<&AtomicBool>,
        cells: Option<&Mutex<Vec<Option<f64>>>>,
    ) -> Result<OptimizationSummary, OptimizeError> {
        let total = space.total();
        let workers = self.worker_count(total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ladderlab-opt-{i}"))
            .build()
            .map_err(|e| OptimizeError::ThreadPool(e.to_string()))?;

        info!(
            total,
            workers,
            metric = %self.config.metric,
            "optimization started"
        );
        if let Some(tx) = events {
            // Receiver gone before start: nothing will drain progress either.
            if tx.send(OptimizerEvent::Start { total, workers }).is_err() {
                return Ok(self.summarize(total, workers, Shared::new(cancel, cells), true));
            }
        }

        let shared = Shared::new(cancel, cells);
        pool.scope(|scope| {
            for _ in 0..workers {
                let tx = events.cloned();
                let shared = &shared;
                let recent_window = self.config.recent_window;
                scope.spawn(move |_| {
                    worker_loop(space, objective, shared, tx.as_ref(), recent_window)
                });
            }
        });

        let cancelled = shared.should_stop() && shared.completed.load(Ordering::SeqCst) < total;
        let summary = self.summarize(total, workers, shared, cancelled);
        info!(
            evaluated = summary.evaluated,
            failed = summary.failed,
            cancelled = summary.cancelled,
            best_score = summary.best.as_ref().map_or(f64::NAN, |b| b.score),
            "optimization finished"
        );

        if let Some(tx) = events {
            let _ = tx.send(OptimizerEvent::Done {
                best: summary.best.clone(),
                evaluated: summary.evaluated,
                failed: summary.failed,
                cancelled: summary.cancelled,
            });
        }
        Ok(summary)
    }

    fn summarize(
        &self,
        total: usize,
        workers: usize,
        shared: Shared<'_>,
        cancelled: bool,
    ) -> OptimizationSummary {
        OptimizationSummary {
            total,
            workers,
            evaluated: shared.completed.load(Ordering::SeqCst),
            failed: shared.failed.load(Ordering::SeqCst),
            cancelled,
            best: shared.best.into_inner().unwrap_or_else(PoisonError::into_inner),
            recent: shared
                .recent
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .into(),
        }
    }
}

/// State shared by all workers of one search.
struct Shared<'a> {
    cursor: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    /// Set when the event receiver hangs up.
    halted: AtomicBool,
    cancel: Option<&'a AtomicBool>,
    best: Mutex<Option<OptimizationResult>>,
    recent: Mutex<VecDeque<OptimizationResult>>,
    cells: Option<&'a Mutex<Vec<Option<f64>>>>,
}

impl<'a> Shared<'a> {
    fn new(cancel: Option<&'a AtomicBool>, cells: Option<&'a Mutex<Vec<Option<f64>>>>) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            cancel,
            best: Mutex::new(None),
            recent: Mutex::new(VecDeque::new()),
            cells,
        }
    }

    fn should_stop(&self) -> bool {
        self.halted.load(Ordering::SeqCst) || self.cancel.is_some_and(|c| c.load(Ordering::SeqCst))
    }

    /// Record a success; returns whether it became the best so far.
    fn offer(&self, result: &OptimizationResult, recent_window: usize) -> bool {
        if let Some(cells) = self.cells {
            if let Some(cell) = lock(cells).get_mut(result.index) {
                *cell = Some(result.score);
            }
        }
        if recent_window > 0 {
            let mut recent = lock(&self.recent);
            if recent.len() == recent_window {
                recent.pop_front();
            }
            recent.push_back(result.clone());
        }
        let mut best = lock(&self.best);
        let improved = best.as_ref().map_or(true, |b| result.beats(b));
        if improved {
            *best = Some(result.clone());
        }
        improved
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn worker_loop<O: Objective + ?Sized>(
    space: &ParamSpace,
    objective: &O,
    shared: &Shared<'_>,
    events: Option<&SyncSender<OptimizerEvent>>,
    recent_window: usize,
) {
    let total = space.total();
    loop {
        if shared.should_stop() {
            return;
        }
        let index = shared.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(params) = space.vector_at(index) else {
            return;
        };

        let event = match objective.evaluate(&params) {
            Ok(mut result) => {
                result.index = index;
                if result.score.is_nan() {
                    result.score = FAILED_SCORE;
                }
                let is_new_best = shared.offer(&result, recent_window);
                let completed = shared.completed.fetch_add(1, Ordering::SeqCst) + 1;
                if is_new_best {
                    debug!(index, score = result.score, params = %params, "new best");
                }
                OptimizerEvent::Progress {
                    index,
                    completed,
                    total,
                    params,
                    score: result.score,
                    is_new_best,
                }
            }
            Err(failure) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                shared.completed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    index,
                    params = %params,
                    insufficient_data = failure.insufficient_data,
                    error = %failure.message,
                    "evaluation failed"
                );
                OptimizerEvent::Error {
                    index,
                    params,
                    message: failure.message,
                }
            }
        };

        if let Some(tx) = events {
            if tx.send(event).is_err() {
                shared.halted.store(true, Ordering::SeqCst);
            }
        }
        if index + 1 >= total {
            return;
        }
    }
}
