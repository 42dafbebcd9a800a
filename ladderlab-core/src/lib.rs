//! LadderLab Core — indicators, signals, filters, the position lifecycle
//! simulator and the signal scorer.
//!
//! Pure computation: candles and a validated [`config::StrategyConfig`] in,
//! trades and an equity curve out. No I/O, no threads.
//!
//! Pipeline per run: candles → indicators → signal generator → filter chain
//! → simulator → trades (optionally annotated by the scorer).

pub mod config;
pub mod domain;
pub mod engine;
pub mod filters;
pub mod indicators;
pub mod scoring;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything an optimizer worker touches is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::TakeProfitLadder>();
        require_sync::<domain::TakeProfitLadder>();

        require_send::<config::StrategyConfig>();
        require_sync::<config::StrategyConfig>();

        require_send::<indicators::IndicatorSeries>();
        require_sync::<indicators::IndicatorSeries>();
        require_send::<filters::FilterChain>();
        require_sync::<filters::FilterChain>();

        require_send::<engine::SimulationResult>();
        require_sync::<engine::SimulationResult>();
        require_send::<engine::SimError>();
        require_sync::<engine::SimError>();

        require_send::<scoring::ScoreBreakdown>();
        require_sync::<scoring::ScoreBreakdown>();
    }

    /// Filter units see market data only: the same candles give the same
    /// verdicts through a trait object, and a prefix of the history gives
    /// the same verdicts as the full series.
    #[test]
    fn filter_units_depend_only_on_candles_up_to_index() {
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.4 + if i % 3 == 0 { -1.5 } else { 0.8 };
                (base - 0.3, base + 1.0, base - 1.0, base)
            })
            .collect();
        let candles = indicators::make_ohlc_candles(&data);

        let configs = [
            config::FilterConfig::TrendConfirmation { ema_period: 5 },
            config::FilterConfig::MomentumBounds {
                rsi_period: 5,
                overbought: 70.0,
                oversold: 30.0,
            },
            config::FilterConfig::TrendStrength {
                adx_period: 5,
                min_adx: 20.0,
            },
            config::FilterConfig::VolumeConfirmation { ma_period: 5 },
        ];

        for cfg in &configs {
            let mut full: Box<dyn filters::FilterUnit> = filters::build(cfg);
            let mut prefix: Box<dyn filters::FilterUnit> = filters::build(cfg);
            full.compute(&candles);
            prefix.compute(&candles[..40]);

            for i in 0..40 {
                for dir in [domain::Direction::Long, domain::Direction::Short] {
                    let a = full.evaluate(i, dir);
                    assert_eq!(a, prefix.evaluate(i, dir), "{} at {i}", cfg.kind());
                    let warming = a.reason == filters::WARMUP_REASON;
                    assert_eq!(warming, i < cfg.warmup(), "{} at {i}", cfg.kind());
                    if warming {
                        assert!(!a.allowed);
                    }
                }
            }
        }
    }
}
