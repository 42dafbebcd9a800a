//! Signal scorer — 0–100 quality rating attached to each trade.
//!
//! Four components, each clamped to [0, 25]:
//! - confluence: share of active filters agreeing with the direction
//! - timeframe: agreement of the same bias on two coarser timeframes (10 + 15)
//! - market context: trend strength band (5/10/15) + volatility regime (2/6/10)
//! - technical levels: distance to the level in the trade's favor, linear decay
//!
//! Scoring never blocks or alters a trade.

pub mod context;
pub mod timeframe;

pub use context::{support_resistance, trend_strength_ratio, volatility_percentile, MarketContext};
pub use timeframe::{bias, resample, TimeframeAlignment};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{check_bounds, check_window, ConfigError, IndicatorConfig, PCT_BOUNDS};
use crate::domain::{Candle, Direction};
use crate::filters::{FilterChain, FilterOutcome};
use crate::indicators::IndicatorSeries;

pub const COMPONENT_MAX: f64 = 25.0;
pub const NEUTRAL_CONFLUENCE: f64 = 12.5;
pub const NEAR_TIER_POINTS: f64 = 10.0;
pub const FAR_TIER_POINTS: f64 = 15.0;
/// Distances at or inside this many percent score the full 25.
pub const LEVEL_NEAR_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// A ≥ 85, B ≥ 70, C ≥ 55, D ≥ 40, else F.
    pub fn from_total(total: f64) -> Self {
        if total >= 85.0 {
            Self::A
        } else if total >= 70.0 {
            Self::B
        } else if total >= 55.0 {
            Self::C
        } else if total >= 40.0 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub confluence: f64,
    pub timeframe: f64,
    pub market_context: f64,
    pub technical_levels: f64,
    pub total: f64,
    pub grade: Grade,
}

impl ScoreBreakdown {
    /// Clamp components, sum, and grade.
    pub fn from_components(
        confluence: f64,
        timeframe: f64,
        market_context: f64,
        technical_levels: f64,
    ) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, COMPONENT_MAX) };
        let (confluence, timeframe, market_context, technical_levels) = (
            clamp(confluence),
            clamp(timeframe),
            clamp(market_context),
            clamp(technical_levels),
        );
        let total = (confluence + timeframe + market_context + technical_levels).clamp(0.0, 100.0);
        Self {
            confluence,
            timeframe,
            market_context,
            technical_levels,
            total,
            grade: Grade::from_total(total),
        }
    }
}

/// Tunables for deriving scorer inputs from candles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Distance (percent) at which the level score reaches 0.
    pub max_level_distance_pct: f64,
    /// Candles scanned for support / resistance.
    pub level_lookback: usize,
    /// ATR values ranked for the volatility percentile.
    pub volatility_lookback: usize,
    pub near_factor: usize,
    pub far_factor: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_level_distance_pct: 10.0,
            level_lookback: 50,
            volatility_lookback: 100,
            near_factor: 4,
            far_factor: 16,
        }
    }
}

impl ScorerConfig {
    /// Bounds: level distance in (2, 100], lookbacks in [1, 500],
    /// 2 <= near_factor < far_factor <= 500.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bounds(
            "max_level_distance_pct",
            self.max_level_distance_pct,
            PCT_BOUNDS,
        )?;
        if self.max_level_distance_pct <= LEVEL_NEAR_PCT {
            return Err(ConfigError::InvalidValue {
                name: "max_level_distance_pct".into(),
                reason: format!(
                    "{} must exceed the full-score distance {LEVEL_NEAR_PCT}",
                    self.max_level_distance_pct
                ),
            });
        }
        check_window("level_lookback", self.level_lookback)?;
        check_window("volatility_lookback", self.volatility_lookback)?;
        check_window("far_factor", self.far_factor)?;
        if self.near_factor < 2 {
            return Err(ConfigError::InvalidValue {
                name: "near_factor".into(),
                reason: format!("{} must be at least 2", self.near_factor),
            });
        }
        if self.far_factor <= self.near_factor {
            return Err(ConfigError::InvalidValue {
                name: "far_factor".into(),
                reason: format!(
                    "{} must be above near_factor {}",
                    self.far_factor, self.near_factor
                ),
            });
        }
        Ok(())
    }
}

/// Agreeing / active × 25; no active filters → 12.5.
pub fn confluence_score(outcomes: &[FilterOutcome]) -> f64 {
    if outcomes.is_empty() {
        return NEUTRAL_CONFLUENCE;
    }
    let agreeing = outcomes.iter().filter(|o| o.allowed).count();
    agreeing as f64 / outcomes.len() as f64 * COMPONENT_MAX
}

/// Full points per agreeing tier, none if opposed, half if undefined.
pub fn timeframe_score(direction: Direction, alignment: &TimeframeAlignment) -> f64 {
    let tier = |bias: Option<Direction>, points: f64| match bias {
        Some(b) if b == direction => points,
        Some(_) => 0.0,
        None => points / 2.0,
    };
    tier(alignment.near, NEAR_TIER_POINTS) + tier(alignment.far, FAR_TIER_POINTS)
}

/// Trend strength: ratio ≥ 2 → 15, ≥ 1 → 10, else 5.
/// Volatility percentile: [25, 75] → 10, [10, 25) or (75, 90] → 6, else 2.
/// Undefined inputs take the lowest band.
pub fn market_context_score(context: &MarketContext) -> f64 {
    let strength = match context.trend_strength {
        Some(r) if r >= 2.0 => 15.0,
        Some(r) if r >= 1.0 => 10.0,
        _ => 5.0,
    };
    let regime = match context.volatility_percentile {
        Some(p) if (25.0..=75.0).contains(&p) => 10.0,
        Some(p) if (10.0..25.0).contains(&p) || (p > 75.0 && p <= 90.0) => 6.0,
        _ => 2.0,
    };
    strength + regime
}

/// 25 within 2%, 0 at or beyond `max_distance_pct`, linear in between.
/// No known level → 0.
pub fn technical_levels_score(distance_pct: Option<f64>, max_distance_pct: f64) -> f64 {
    let Some(d) = distance_pct.filter(|d| !d.is_nan()) else {
        return 0.0;
    };
    let d = d.abs();
    if d <= LEVEL_NEAR_PCT {
        COMPONENT_MAX
    } else if d >= max_distance_pct {
        0.0
    } else {
        COMPONENT_MAX * (max_distance_pct - d) / (max_distance_pct - LEVEL_NEAR_PCT)
    }
}

/// Combine pre-derived inputs into a breakdown.
pub fn score(
    direction: Direction,
    outcomes: &[FilterOutcome],
    alignment: &TimeframeAlignment,
    context: &MarketContext,
    level_distance_pct: Option<f64>,
    config: &ScorerConfig,
) -> ScoreBreakdown {
    ScoreBreakdown::from_components(
        confluence_score(outcomes),
        timeframe_score(direction, alignment),
        market_context_score(context),
        technical_levels_score(level_distance_pct, config.max_level_distance_pct),
    )
}

/// Score an entry at `index` from raw run data. Uses candles up to `index` only.
pub fn score_entry(
    candles: &[Candle],
    series: &IndicatorSeries,
    chain: &FilterChain,
    indicators: &IndicatorConfig,
    config: &ScorerConfig,
    index: usize,
    direction: Direction,
) -> ScoreBreakdown {
    let history = &candles[..(index + 1).min(candles.len())];
    let outcomes = chain.outcomes(index, direction);
    let alignment = TimeframeAlignment::evaluate(history, indicators, config);
    let context = MarketContext::at(candles, series, index, config.volatility_lookback);
    let distance = history.last().and_then(|c| {
        let (support, resistance) = support_resistance(history, config.level_lookback)?;
        let level = match direction {
            Direction::Long => support,
            Direction::Short => resistance,
        };
        Some((c.close - level).abs() / c.close * 100.0)
    });
    score(direction, &outcomes, &alignment, &context, distance, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(allowed: bool) -> FilterOutcome {
        FilterOutcome {
            name: "f".into(),
            allowed,
            reason: String::new(),
        }
    }

    #[test]
    fn grade_boundaries_are_exact() {
        assert_eq!(Grade::from_total(100.0), Grade::A);
        assert_eq!(Grade::from_total(85.0), Grade::A);
        assert_eq!(Grade::from_total(84.0), Grade::B);
        assert_eq!(Grade::from_total(84.999), Grade::B);
        assert_eq!(Grade::from_total(70.0), Grade::B);
        assert_eq!(Grade::from_total(69.0), Grade::C);
        assert_eq!(Grade::from_total(55.0), Grade::C);
        assert_eq!(Grade::from_total(54.0), Grade::D);
        assert_eq!(Grade::from_total(40.0), Grade::D);
        assert_eq!(Grade::from_total(39.0), Grade::F);
        assert_eq!(Grade::from_total(0.0), Grade::F);
    }

    #[test]
    fn scorer_config_validation() {
        assert!(ScorerConfig::default().validate().is_ok());

        let bad = [
            ScorerConfig {
                max_level_distance_pct: -5.0,
                ..ScorerConfig::default()
            },
            ScorerConfig {
                max_level_distance_pct: 1.5,
                ..ScorerConfig::default()
            },
            ScorerConfig {
                level_lookback: 0,
                ..ScorerConfig::default()
            },
            ScorerConfig {
                near_factor: 1,
                ..ScorerConfig::default()
            },
            ScorerConfig {
                near_factor: 16,
                far_factor: 4,
                ..ScorerConfig::default()
            },
        ];
        for config in &bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn zero_filters_is_neutral() {
        let c = confluence_score(&[]);
        assert_eq!(c, NEUTRAL_CONFLUENCE);
        assert!(!c.is_nan());
    }

    #[test]
    fn confluence_fraction() {
        let outcomes = [outcome(true), outcome(false), outcome(true), outcome(true)];
        assert_eq!(confluence_score(&outcomes), 18.75);
    }

    #[test]
    fn timeframe_tiers() {
        let both = TimeframeAlignment {
            near: Some(Direction::Long),
            far: Some(Direction::Long),
        };
        assert_eq!(timeframe_score(Direction::Long, &both), 25.0);
        assert_eq!(timeframe_score(Direction::Short, &both), 0.0);
        let unknown = TimeframeAlignment::default();
        assert_eq!(timeframe_score(Direction::Long, &unknown), 12.5);
        let far_only = TimeframeAlignment {
            near: Some(Direction::Short),
            far: Some(Direction::Long),
        };
        assert_eq!(timeframe_score(Direction::Long, &far_only), 15.0);
    }

    #[test]
    fn market_context_bands() {
        let ctx = |s, p| MarketContext {
            trend_strength: s,
            volatility_percentile: p,
        };
        assert_eq!(market_context_score(&ctx(Some(2.5), Some(50.0))), 25.0);
        assert_eq!(market_context_score(&ctx(Some(1.0), Some(80.0))), 16.0);
        assert_eq!(market_context_score(&ctx(Some(0.3), Some(95.0))), 7.0);
        assert_eq!(market_context_score(&ctx(None, Some(10.0))), 11.0);
        assert_eq!(market_context_score(&ctx(None, None)), 7.0);
    }

    #[test]
    fn level_decay() {
        assert_eq!(technical_levels_score(Some(1.0), 10.0), 25.0);
        assert_eq!(technical_levels_score(Some(2.0), 10.0), 25.0);
        assert_eq!(technical_levels_score(Some(6.0), 10.0), 12.5);
        assert_eq!(technical_levels_score(Some(10.0), 10.0), 0.0);
        assert_eq!(technical_levels_score(Some(40.0), 10.0), 0.0);
        assert_eq!(technical_levels_score(None, 10.0), 0.0);
    }

    #[test]
    fn components_are_clamped() {
        let b = ScoreBreakdown::from_components(40.0, -3.0, f64::NAN, 25.0);
        assert_eq!(b.confluence, 25.0);
        assert_eq!(b.timeframe, 0.0);
        assert_eq!(b.market_context, 0.0);
        assert_eq!(b.total, 50.0);
        assert_eq!(b.grade, Grade::D);
    }

    #[test]
    fn perfect_score_is_grade_a() {
        let alignment = TimeframeAlignment {
            near: Some(Direction::Long),
            far: Some(Direction::Long),
        };
        let context = MarketContext {
            trend_strength: Some(3.0),
            volatility_percentile: Some(50.0),
        };
        let b = score(
            Direction::Long,
            &[outcome(true)],
            &alignment,
            &context,
            Some(0.5),
            &ScorerConfig::default(),
        );
        assert_eq!(b.total, 100.0);
        assert_eq!(b.grade, Grade::A);
    }
}
