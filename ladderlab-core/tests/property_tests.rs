//! Property tests for simulator and scorer invariants.
//!
//! 1. Remaining size stays in [0, 100] and never increases
//! 2. Stops only move in the position's favor
//! 3. Every closed trade accounts for exactly 100% of its size, TP hits ascending
//! 4. Ladder validation accepts exactly the well-formed ladders
//! 5. Score components stay in [0, 25], total in [0, 100]
//! 6. Leveraged losses never take cash or equity below zero

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;

use ladderlab_core::config::{IndicatorConfig, SimulatorConfig};
use ladderlab_core::domain::{
    Candle, Direction, ExitReason, StopLossMode, TakeProfitLadder, TakeProfitLevel, MAX_TP_LEVELS,
};
use ladderlab_core::engine::{SimulationContext, Simulator};
use ladderlab_core::filters::FilterChain;
use ladderlab_core::indicators::compute;
use ladderlab_core::scoring::{Grade, ScoreBreakdown};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_candles() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-3.0..3.0_f64, 0.05..2.0_f64), 5..80).prop_map(|steps| {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut price = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (change, wick))| {
                let open = price;
                let close = (price * (1.0 + change / 100.0)).max(1.0);
                price = close;
                Candle::new(
                    base + Duration::hours(i as i64),
                    open,
                    open.max(close) * (1.0 + wick / 100.0),
                    open.min(close) * (1.0 - wick / 100.0),
                    close,
                    1000.0,
                )
            })
            .collect()
    })
}

fn arb_ladder() -> impl Strategy<Value = TakeProfitLadder> {
    // At most 4 × 24% closed: always within the 100% budget.
    prop::collection::vec((0.2..2.0_f64, 5.0..24.0_f64), 1..=4).prop_map(|raw| {
        let mut target = 0.0;
        let levels = raw
            .into_iter()
            .map(|(step, close)| {
                target += step;
                TakeProfitLevel::new(target, close)
            })
            .collect();
        TakeProfitLadder::new(levels).expect("generated ladder is valid")
    })
}

fn arb_mode() -> impl Strategy<Value = StopLossMode> {
    (0_i64..=4).prop_map(|code| StopLossMode::from_code(code).unwrap())
}

fn sim_config(ladder: TakeProfitLadder, mode: StopLossMode, stop: f64) -> SimulatorConfig {
    let mode = match mode {
        StopLossMode::AfterTp { k } if k > ladder.len() => StopLossMode::Fixed,
        other => other,
    };
    SimulatorConfig {
        ladder,
        stop_loss_pct: stop,
        stop_mode: mode,
        allow_reentry_after_sl: true,
        allow_reentry_after_tp: true,
        ..SimulatorConfig::default()
    }
}

fn indicators() -> IndicatorConfig {
    IndicatorConfig {
        channel_period: 3,
        channel_multiplier: 0.2,
        atr_period: 3,
    }
}

// ── 1 & 2. Position invariants, observed candle by candle ────────────

proptest! {
    #[test]
    fn remaining_size_bounded_and_non_increasing(
        candles in arb_candles(),
        ladder in arb_ladder(),
        mode in arb_mode(),
        stop in 0.5..8.0_f64,
    ) {
        let config = sim_config(ladder, mode, stop);
        let series = compute(&candles, &indicators());
        let chain = FilterChain::new();
        let sim = Simulator::new(&candles, &series, &chain, &config);
        let mut ctx = SimulationContext::new(config.initial_capital, candles.len());

        let mut last_remaining: HashMap<u64, f64> = HashMap::new();
        let mut last_stop: HashMap<u64, (Direction, f64)> = HashMap::new();

        for t in 0..candles.len() {
            sim.step(&mut ctx, t).unwrap();
            if let Some(pos) = ctx.position() {
                prop_assert!((0.0..=100.0).contains(&pos.remaining_pct));
                if let Some(prev) = last_remaining.insert(pos.id, pos.remaining_pct) {
                    prop_assert!(pos.remaining_pct <= prev + 1e-12);
                }
                if let Some((direction, prev)) = last_stop.insert(pos.id, (pos.direction, pos.stop_loss)) {
                    match direction {
                        Direction::Long => prop_assert!(pos.stop_loss >= prev),
                        Direction::Short => prop_assert!(pos.stop_loss <= prev),
                    }
                }
            }
        }
        sim.finish(&mut ctx).unwrap();
        prop_assert!(ctx.position().is_none());
    }

    // ── 3. Closed trades ─────────────────────────────────────────────

    #[test]
    fn closed_trades_account_for_full_size(
        candles in arb_candles(),
        ladder in arb_ladder(),
        mode in arb_mode(),
        stop in 0.5..8.0_f64,
    ) {
        let config = sim_config(ladder, mode, stop);
        let series = compute(&candles, &indicators());
        let chain = FilterChain::new();
        let result = Simulator::new(&candles, &series, &chain, &config).run().unwrap();

        for trade in &result.trades {
            let closed: f64 = trade.fills.iter().map(|f| f.size_pct).sum();
            prop_assert!((closed - 100.0).abs() < 1e-6, "closed {closed}%");
            prop_assert!(trade.fills.iter().all(|f| f.size_pct > 0.0));
            prop_assert!(trade.tp_hits.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(trade.exit_index >= trade.entry_index);
            if let ExitReason::TakeProfit(n) = trade.exit_reason {
                prop_assert_eq!(trade.tp_hits.last().copied(), Some(n));
            }
        }
        prop_assert_eq!(result.equity_curve.len(), candles.len());
    }

    // ── 4. Ladder validation ─────────────────────────────────────────

    #[test]
    fn ladder_validation_matches_rules(
        raw in prop::collection::vec((0.0..12.0_f64, 0.0..60.0_f64), 0..12),
    ) {
        let levels: Vec<TakeProfitLevel> =
            raw.iter().map(|&(t, c)| TakeProfitLevel::new(t, c)).collect();
        let well_formed = !levels.is_empty()
            && levels.len() <= MAX_TP_LEVELS
            && levels.iter().all(|l| l.target_pct > 0.0 && l.close_pct > 0.0)
            && levels.windows(2).all(|w| w[1].target_pct > w[0].target_pct)
            && levels.iter().map(|l| l.close_pct).sum::<f64>() <= 100.0 + 1e-9;
        let result = TakeProfitLadder::new(levels);
        prop_assert_eq!(result.is_ok(), well_formed);
        if let Ok(ladder) = result {
            prop_assert!(ladder.total_close_pct() + ladder.remainder_pct() <= 100.0 + 1e-9);
        }
    }

    // ── 5. Score clamping ────────────────────────────────────────────

    #[test]
    fn score_components_clamped(
        a in -50.0..80.0_f64,
        b in -50.0..80.0_f64,
        c in -50.0..80.0_f64,
        d in -50.0..80.0_f64,
    ) {
        let score = ScoreBreakdown::from_components(a, b, c, d);
        for v in [score.confluence, score.timeframe, score.market_context, score.technical_levels] {
            prop_assert!((0.0..=25.0).contains(&v));
        }
        prop_assert!((0.0..=100.0).contains(&score.total));
        prop_assert_eq!(score.grade, Grade::from_total(score.total));
    }

    // ── 6. Leverage ──────────────────────────────────────────────────

    #[test]
    fn leveraged_losses_stay_within_capital(
        candles in arb_candles(),
        ladder in arb_ladder(),
        leverage in 1.0..125.0_f64,
        stop in 0.5..8.0_f64,
    ) {
        let config = SimulatorConfig {
            leverage,
            commission_enabled: true,
            commission_pct: 0.1,
            ..sim_config(ladder, StopLossMode::Fixed, stop)
        };
        let series = compute(&candles, &indicators());
        let chain = FilterChain::new();
        let sim = Simulator::new(&candles, &series, &chain, &config);
        let mut ctx = SimulationContext::new(config.initial_capital, candles.len());

        for t in 0..candles.len() {
            sim.step(&mut ctx, t).unwrap();
            prop_assert!(ctx.cash() >= -1e-6, "cash {} at {t}", ctx.cash());
        }
        sim.finish(&mut ctx).unwrap();
        prop_assert!(ctx.cash() >= -1e-6);
        for trade in ctx.trades() {
            prop_assert!(trade.net_pnl_pct >= -100.0 - 1e-9, "net {}", trade.net_pnl_pct);
        }

        let result = sim.run().unwrap();
        prop_assert!(result.equity_curve.iter().all(|p| p.equity >= -1e-6));
    }
}
