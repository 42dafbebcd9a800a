//! Position lifecycle simulator — candle-by-candle state machine.
//!
//! Per candle `t`, with at most one position open:
//! 1. Advance the signal generator (trend flags follow every candle).
//! 2. If a position opened before `t`:
//!    a. stop-loss hit → close everything at the stop price;
//!    b. otherwise take-profit levels, ascending, each closing its share of
//!       the original size at the level price, relocating the stop after
//!       each hit (the new stop is first checked on `t + 1`);
//!    c. if still open and the signal reverses, close everything at the close.
//! 3. With no position open, an allowed entry (or permitted re-entry) opens
//!    at the close of `t`.
//! 4. Record one equity point marked to the close of `t`.
//!
//! Anything still open after the last candle exits at the last close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::stop_policy;
use super::SimError;
use crate::config::SimulatorConfig;
use crate::domain::{
    Candle, Direction, ExitReason, Position, PositionEntry, PositionStatus, TradeRecord,
    SIZE_EPSILON,
};
use crate::filters::FilterChain;
use crate::indicators::IndicatorSeries;
use crate::signals::{Signal, SignalGenerator, TrendState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Entries proposed by the generator (fresh signals and re-entry candidates)
    /// that the filter chain rejected.
    pub filtered_signals: usize,
}

impl SimulationResult {
    pub fn total_return_pct(&self) -> f64 {
        (self.final_equity / self.initial_capital - 1.0) * 100.0
    }
}

/// How the previous position ended, for the re-entry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LastExit {
    direction: Direction,
    reason: ExitReason,
}

/// Everything that changes across candles in one run, owned by the loop.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    generator: SignalGenerator,
    position: Option<Position>,
    last_exit: Option<LastExit>,
    next_id: u64,
    /// Realized account value: initial capital plus every fill and commission so far.
    cash: f64,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
    filtered_signals: usize,
}

impl SimulationContext {
    pub fn new(initial_capital: f64, capacity: usize) -> Self {
        Self {
            generator: SignalGenerator::new(),
            position: None,
            last_exit: None,
            next_id: 1,
            cash: initial_capital,
            trades: Vec::new(),
            equity_curve: Vec::with_capacity(capacity),
            filtered_signals: 0,
        }
    }

    pub fn trend_state(&self) -> TrendState {
        self.generator.state()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }
}

/// Drives one strategy over one candle series.
pub struct Simulator<'a> {
    candles: &'a [Candle],
    series: &'a IndicatorSeries,
    filters: &'a FilterChain,
    config: &'a SimulatorConfig,
    commission_pct: f64,
}

impl<'a> Simulator<'a> {
    pub fn new(
        candles: &'a [Candle],
        series: &'a IndicatorSeries,
        filters: &'a FilterChain,
        config: &'a SimulatorConfig,
    ) -> Self {
        Self {
            candles,
            series,
            filters,
            config,
            commission_pct: config.effective_commission_pct(),
        }
    }

    /// Run every candle and close whatever is left at the end.
    pub fn run(&self) -> Result<SimulationResult, SimError> {
        let mut ctx = SimulationContext::new(self.config.initial_capital, self.candles.len());
        for t in 0..self.candles.len() {
            self.step(&mut ctx, t)?;
        }
        self.finish(&mut ctx)?;

        debug!(
            trades = ctx.trades.len(),
            final_equity = ctx.cash,
            filtered = ctx.filtered_signals,
            "simulation finished"
        );

        Ok(SimulationResult {
            trades: ctx.trades,
            equity_curve: ctx.equity_curve,
            initial_capital: self.config.initial_capital,
            final_equity: ctx.cash,
            filtered_signals: ctx.filtered_signals,
        })
    }

    /// Advance the context by candle `t`. Candles must be fed in order.
    pub fn step(&self, ctx: &mut SimulationContext, t: usize) -> Result<(), SimError> {
        let candle = &self.candles[t];
        let signal = ctx.generator.step(self.candles, self.series, t);

        if let Some(mut position) = ctx.position.take() {
            if t > position.entry_index {
                self.manage(&mut position, candle, t, &signal, &mut ctx.cash)?;
            }
            if position.is_closed() {
                self.record_close(ctx, &position)?;
            } else {
                ctx.position = Some(position);
            }
        }

        if ctx.position.is_none() {
            self.try_enter(ctx, candle, &signal)?;
        }

        let unrealized = ctx
            .position
            .as_ref()
            .map(|p| p.capital_at_risk * p.unrealized_pnl_pct(candle.close) / 100.0)
            .unwrap_or(0.0);
        ctx.equity_curve.push(EquityPoint {
            time: candle.timestamp,
            equity: ctx.cash + unrealized,
        });
        Ok(())
    }

    /// Close a position still open after the last candle.
    pub fn finish(&self, ctx: &mut SimulationContext) -> Result<(), SimError> {
        let Some(mut position) = ctx.position.take() else {
            return Ok(());
        };
        let Some(last) = self.candles.len().checked_sub(1) else {
            return Ok(());
        };
        let candle = &self.candles[last];
        let net = position.close_all(
            candle.close,
            candle,
            last,
            ExitReason::EndOfData,
            self.commission_pct,
        )?;
        ctx.cash += position.capital_at_risk * net / 100.0;
        self.record_close(ctx, &position)?;
        if let Some(point) = ctx.equity_curve.last_mut() {
            point.equity = ctx.cash;
        }
        Ok(())
    }

    /// Stop-loss, then take-profits, then reversal.
    fn manage(
        &self,
        position: &mut Position,
        candle: &Candle,
        t: usize,
        signal: &Signal,
        cash: &mut f64,
    ) -> Result<(), SimError> {
        position.observe(candle);
        let capital = position.capital_at_risk;

        if position.stop_hit_by(candle) {
            let net = position.close_all(
                position.stop_loss,
                candle,
                t,
                ExitReason::StopLoss,
                self.commission_pct,
            )?;
            *cash += capital * net / 100.0;
            return Ok(());
        }

        for i in 0..position.levels.len() {
            let level = position.levels[i];
            if level.hit || !position.level_hit_by(&level, candle) {
                continue;
            }
            let size = level.level.close_pct.min(position.remaining_pct);
            position.levels[i].hit = true;
            if size > SIZE_EPSILON {
                let net = position.close_portion(
                    size,
                    level.price,
                    candle,
                    t,
                    ExitReason::TakeProfit(i + 1),
                    self.commission_pct,
                )?;
                *cash += capital * net / 100.0;
                trace!(id = position.id, level = i + 1, price = level.price, net, "take-profit");
            }
            if stop_policy::relocate(position) {
                trace!(id = position.id, stop = position.stop_loss, "stop relocated");
            }
            check_size(position)?;
            if position.is_closed() {
                return Ok(());
            }
        }

        if signal.direction == Some(position.direction.opposite()) {
            let net = position.close_all(
                candle.close,
                candle,
                t,
                ExitReason::SignalReversal,
                self.commission_pct,
            )?;
            *cash += capital * net / 100.0;
        }
        Ok(())
    }

    fn record_close(&self, ctx: &mut SimulationContext, position: &Position) -> Result<(), SimError> {
        let trade = TradeRecord::from_position(position).ok_or_else(|| {
            SimError::InvariantViolation(format!("position {} closed without fills", position.id))
        })?;
        debug!(
            id = trade.id,
            direction = trade.direction.label(),
            exit = %trade.exit_reason,
            pnl_pct = trade.net_pnl_pct,
            reentry = trade.is_reentry,
            "position closed"
        );
        ctx.last_exit = Some(LastExit {
            direction: trade.direction,
            reason: trade.exit_reason,
        });
        ctx.trades.push(trade);
        Ok(())
    }

    /// Fresh entries first; otherwise a re-entry if the last exit permits it.
    fn try_enter(
        &self,
        ctx: &mut SimulationContext,
        candle: &Candle,
        signal: &Signal,
    ) -> Result<(), SimError> {
        let (direction, is_reentry) = match (signal.direction, signal.reentry) {
            (Some(direction), _) => (direction, false),
            (None, Some(direction)) if self.reentry_permitted(ctx.last_exit, direction) => {
                (direction, true)
            }
            _ => return Ok(()),
        };

        let decision = self.filters.allow(signal.index, direction);
        if !decision.allowed {
            ctx.filtered_signals += 1;
            trace!(
                index = signal.index,
                filter = decision.filter.as_deref().unwrap_or(""),
                reason = %decision.reason,
                "entry filtered"
            );
            return Ok(());
        }

        let capital_at_risk = ctx.cash.max(0.0) * self.config.position_size_pct / 100.0;
        let mut position = Position::open(
            PositionEntry {
                id: ctx.next_id,
                direction,
                index: signal.index,
                time: candle.timestamp,
                price: candle.close,
                capital_at_risk,
                leverage: self.config.leverage,
                is_reentry,
            },
            &self.config.ladder,
            self.config.stop_loss_pct,
            self.config.stop_mode,
        );
        let entry_cost = position.charge_entry_commission(self.commission_pct);
        ctx.cash -= capital_at_risk * entry_cost / 100.0;
        ctx.next_id += 1;

        debug!(
            id = position.id,
            direction = direction.label(),
            price = position.entry_price,
            stop = position.stop_loss,
            reentry = is_reentry,
            "position opened"
        );
        ctx.position = Some(position);
        Ok(())
    }

    fn reentry_permitted(&self, last_exit: Option<LastExit>, direction: Direction) -> bool {
        match last_exit {
            Some(LastExit {
                direction: last,
                reason: ExitReason::StopLoss,
            }) => last == direction && self.config.allow_reentry_after_sl,
            Some(LastExit {
                direction: last,
                reason: ExitReason::TakeProfit(_),
            }) => last == direction && self.config.allow_reentry_after_tp,
            _ => false,
        }
    }
}

fn check_size(position: &Position) -> Result<(), SimError> {
    let r = position.remaining_pct;
    if !(0.0..=100.0).contains(&r) {
        return Err(SimError::InvariantViolation(format!(
            "position {} remaining size {r} outside [0, 100]",
            position.id
        )));
    }
    if (r == 0.0) != (position.status == PositionStatus::Closed) {
        return Err(SimError::InvariantViolation(format!(
            "position {} status {:?} with {r}% remaining",
            position.id, position.status
        )));
    }
    Ok(())
}

/// Convenience wrapper: run a full simulation.
pub fn simulate(
    candles: &[Candle],
    series: &IndicatorSeries,
    filters: &FilterChain,
    config: &SimulatorConfig,
) -> Result<SimulationResult, SimError> {
    Simulator::new(candles, series, filters, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::domain::{StopLossMode, TakeProfitLadder};
    use crate::indicators::{compute, make_ohlc_candles};

    /// Period-1 channel, multiplier 0.1: any strongly bullish candle breaks out.
    fn indicators() -> IndicatorConfig {
        IndicatorConfig {
            channel_period: 1,
            channel_multiplier: 0.1,
            atr_period: 1,
        }
    }

    fn sim_config(mode: StopLossMode) -> SimulatorConfig {
        SimulatorConfig {
            ladder: TakeProfitLadder::from_pairs(&[(1.0, 50.0), (2.0, 50.0)]).unwrap(),
            stop_loss_pct: 5.0,
            stop_mode: mode,
            ..SimulatorConfig::default()
        }
    }

    fn run(data: &[(f64, f64, f64, f64)], config: &SimulatorConfig) -> SimulationResult {
        let candles = make_ohlc_candles(data);
        let series = compute(&candles, &indicators());
        simulate(&candles, &series, &FilterChain::new(), config).unwrap()
    }

    #[test]
    fn ladder_fills_both_levels() {
        let result = run(
            &[
                (99.0, 100.2, 98.9, 100.0),   // breakout, entry at 100
                (100.0, 101.5, 99.8, 101.2),  // TP1 @ 101
                (101.2, 102.5, 101.0, 102.3), // TP2 @ 102
            ],
            &sim_config(StopLossMode::Fixed),
        );
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit(2));
        assert_eq!(trade.tp_hits, vec![1, 2]);
        assert!((trade.net_pnl_pct - 1.5).abs() < 1e-9);
    }

    #[test]
    fn stepping_exposes_context() {
        let candles = make_ohlc_candles(&[
            (99.0, 100.2, 98.9, 100.0),
            (100.0, 101.5, 99.8, 101.2),
            (101.2, 102.5, 101.0, 102.3),
        ]);
        let series = compute(&candles, &indicators());
        let chain = FilterChain::new();
        let config = sim_config(StopLossMode::Fixed);
        let sim = Simulator::new(&candles, &series, &chain, &config);
        let mut ctx = SimulationContext::new(config.initial_capital, candles.len());

        sim.step(&mut ctx, 0).unwrap();
        assert!(ctx.trend_state().in_long_trend);
        assert!(!ctx.trend_state().in_short_trend);
        assert_eq!(ctx.position().map(|p| p.entry_price), Some(100.0));
        assert_eq!(ctx.cash(), 10_000.0);
        assert!(ctx.trades().is_empty());

        sim.step(&mut ctx, 1).unwrap();
        assert_eq!(ctx.position().map(|p| p.remaining_pct), Some(50.0));
        assert!((ctx.cash() - 10_050.0).abs() < 1e-6);

        sim.step(&mut ctx, 2).unwrap();
        assert!(ctx.position().is_none());
        assert_eq!(ctx.trades().len(), 1);
        assert!((ctx.cash() - 10_150.0).abs() < 1e-6);

        sim.finish(&mut ctx).unwrap();
        assert_eq!(ctx.trades().len(), 1);
    }

    #[test]
    fn no_exit_checks_on_entry_candle() {
        // Entry candle's own high is far above TP2; nothing fills until t+1.
        let result = run(
            &[(95.0, 110.0, 94.0, 100.0), (100.0, 100.5, 99.5, 100.2)],
            &sim_config(StopLossMode::Fixed),
        );
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert!(trade.tp_hits.is_empty());
        assert_eq!(trade.exit_index, 1);
    }

    #[test]
    fn stop_loss_checked_before_take_profit() {
        // Candle 1 spans both SL (95) and TP1 (101).
        let result = run(
            &[(99.0, 100.2, 98.9, 100.0), (100.0, 102.0, 94.0, 100.0)],
            &sim_config(StopLossMode::Fixed),
        );
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(trade.tp_hits.is_empty());
        assert!((trade.net_pnl_pct + 5.0).abs() < 1e-9);
    }

    #[test]
    fn relocated_stop_applies_from_next_candle() {
        // Candle 1 hits TP1 and dips to 99.9, below the relocated stop (100),
        // but the relocated stop is only live from candle 2.
        let result = run(
            &[
                (99.0, 100.2, 98.9, 100.0),
                (100.0, 101.2, 99.9, 100.5),
                (100.5, 100.6, 99.5, 99.6),
            ],
            &sim_config(StopLossMode::AfterTp { k: 1 }),
        );
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_index, 2);
        assert_eq!(trade.exit_price, 100.0);
        assert!((trade.net_pnl_pct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_has_one_point_per_candle() {
        let result = run(
            &[
                (99.0, 100.2, 98.9, 100.0),
                (100.0, 101.5, 99.8, 101.2),
                (101.2, 102.5, 101.0, 102.3),
            ],
            &sim_config(StopLossMode::Fixed),
        );
        assert_eq!(result.equity_curve.len(), 3);
        assert!(result
            .equity_curve
            .windows(2)
            .all(|w| w[0].time < w[1].time));
        // 100% of 10_000 at risk, +1.5%.
        assert!((result.final_equity - 10_150.0).abs() < 1e-6);
        assert!((result.equity_curve[2].equity - 10_150.0).abs() < 1e-6);
        assert!((result.total_return_pct() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn commission_and_leverage_flow_into_equity() {
        let mut config = sim_config(StopLossMode::Fixed);
        config.leverage = 10.0;
        config.commission_enabled = true;
        config.commission_pct = 0.1;
        let result = run(
            &[
                (99.0, 100.2, 98.9, 100.0),
                (100.0, 101.5, 99.8, 101.2),
                (101.2, 102.5, 101.0, 102.3),
            ],
            &config,
        );
        let trade = &result.trades[0];
        // Gross 15%, commission 1% entry + 0.5% + 0.5%.
        assert!((trade.gross_pnl_pct - 15.0).abs() < 1e-9);
        assert!((trade.commission_pct - 2.0).abs() < 1e-9);
        assert!((trade.net_pnl_pct - 13.0).abs() < 1e-9);
        assert!((result.final_equity - 11_300.0).abs() < 1e-6);
    }

    #[test]
    fn empty_series_produces_nothing() {
        let result = run(&[], &sim_config(StopLossMode::Fixed));
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.is_empty());
        assert_eq!(result.final_equity, result.initial_capital);
    }
}
