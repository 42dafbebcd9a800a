//! Performance statistics — pure functions over a trade ledger and equity curve.
//!
//! Trade-level figures are in percent of capital-at-risk (the simulator's
//! `net_pnl_pct`); account-level figures (return, drawdown) come from the
//! equity curve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ladderlab_core::domain::TradeRecord;
use ladderlab_core::engine::{EquityPoint, SimulationResult};

/// Profit factor reported when there are winners but no losers.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// One calendar month of closed trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    /// `YYYY-MM` of the exit time.
    pub period: String,
    pub trades: usize,
    pub pnl_pct: f64,
    pub win_rate: f64,
}

/// Summary statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive net PnL.
    pub win_rate: f64,
    /// Sum of per-trade net percents.
    pub total_pnl_pct: f64,
    /// Account return from the equity curve.
    pub total_return_pct: f64,
    pub profit_factor: f64,
    /// Positive magnitude, e.g. 12.5 for a 12.5% peak-to-trough decline.
    pub max_drawdown_pct: f64,
    pub avg_trade_pct: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub sharpe: f64,
    pub reentries: usize,
    /// Keyed by the exit reason label (`SL`, `TP2`, ...).
    pub exit_reasons: BTreeMap<String, usize>,
    pub periods: Vec<PeriodStats>,
}

impl Statistics {
    pub fn compute(result: &SimulationResult) -> Self {
        let trades = &result.trades;
        let wins = trades.iter().filter(|t| t.is_winner()).count();
        let losses = trades.iter().filter(|t| t.net_pnl_pct < 0.0).count();
        let equity = equity_values(&result.equity_curve);

        Self {
            trade_count: trades.len(),
            wins,
            losses,
            win_rate: win_rate(trades),
            total_pnl_pct: trades.iter().map(|t| t.net_pnl_pct).sum(),
            total_return_pct: result.total_return_pct(),
            profit_factor: profit_factor(trades),
            max_drawdown_pct: max_drawdown_pct(&equity),
            avg_trade_pct: mean(trades.iter().map(|t| t.net_pnl_pct)),
            avg_win_pct: mean(trades.iter().map(|t| t.net_pnl_pct).filter(|p| *p > 0.0)),
            avg_loss_pct: mean(trades.iter().map(|t| t.net_pnl_pct).filter(|p| *p < 0.0)),
            sharpe: sharpe_like(trades),
            reentries: trades.iter().filter(|t| t.is_reentry).count(),
            exit_reasons: exit_reason_counts(trades),
            periods: period_breakdown(trades),
        }
    }

    /// Statistics of a run that produced no trades and flat equity.
    pub fn empty() -> Self {
        Self {
            trade_count: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            total_pnl_pct: 0.0,
            total_return_pct: 0.0,
            profit_factor: 0.0,
            max_drawdown_pct: 0.0,
            avg_trade_pct: 0.0,
            avg_win_pct: 0.0,
            avg_loss_pct: 0.0,
            sharpe: 0.0,
            reentries: 0,
            exit_reasons: BTreeMap::new(),
            periods: Vec::new(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Win rate in percent.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross winning percent / gross losing percent.
///
/// Capped at [`PROFIT_FACTOR_CAP`] (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl_pct > 0.0)
        .map(|t| t.net_pnl_pct)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl_pct < 0.0)
        .map(|t| t.net_pnl_pct.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Maximum peak-to-trough decline in percent, as a positive number.
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak * 100.0);
        }
    }
    max_dd
}

/// mean / stddev of per-trade net percents, scaled by sqrt(n).
///
/// Returns 0.0 with fewer than two trades or zero dispersion.
pub fn sharpe_like(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(|t| t.net_pnl_pct).collect();
    let n = returns.len() as f64;
    let m = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    m / std * n.sqrt()
}

pub fn exit_reason_counts(trades: &[TradeRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for t in trades {
        *counts.entry(t.exit_reason.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Per-month breakdown keyed by exit time, in chronological order.
pub fn period_breakdown(trades: &[TradeRecord]) -> Vec<PeriodStats> {
    let mut buckets: BTreeMap<String, Vec<&TradeRecord>> = BTreeMap::new();
    for t in trades {
        buckets
            .entry(t.exit_time.format("%Y-%m").to_string())
            .or_default()
            .push(t);
    }
    buckets
        .into_iter()
        .map(|(period, group)| {
            let wins = group.iter().filter(|t| t.is_winner()).count();
            PeriodStats {
                period,
                trades: group.len(),
                pnl_pct: group.iter().map(|t| t.net_pnl_pct).sum(),
                win_rate: wins as f64 / group.len() as f64 * 100.0,
            }
        })
        .collect()
}
