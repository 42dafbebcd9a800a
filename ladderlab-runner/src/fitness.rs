//! Objective metrics — configurable scalar used to rank parameter vectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::metrics::Statistics;

/// Score assigned to a parameter vector that could not be evaluated.
pub const FAILED_SCORE: f64 = f64::NEG_INFINITY;

/// Which metric the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMetric {
    /// Account return in percent.
    ProfitPct,
    WinRate,
    /// 0.4·return + 0.03·win rate + 0.3·min(PF, 10) − 0.2·drawdown.
    #[default]
    Composite,
    /// return / max(drawdown, 1).
    RiskAdjusted,
}

impl ObjectiveMetric {
    pub const ALL: [ObjectiveMetric; 4] = [
        Self::ProfitPct,
        Self::WinRate,
        Self::Composite,
        Self::RiskAdjusted,
    ];

    /// Score a run. Zero-trade runs score 0 for every metric.
    pub fn score(&self, stats: &Statistics) -> f64 {
        if stats.trade_count == 0 {
            return 0.0;
        }
        let value = match self {
            Self::ProfitPct => stats.total_return_pct,
            Self::WinRate => stats.win_rate,
            Self::Composite => {
                0.4 * stats.total_return_pct
                    + 0.03 * stats.win_rate
                    + 0.3 * stats.profit_factor.min(10.0)
                    - 0.2 * stats.max_drawdown_pct
            }
            Self::RiskAdjusted => stats.total_return_pct / stats.max_drawdown_pct.max(1.0),
        };
        if value.is_finite() {
            value
        } else {
            FAILED_SCORE
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProfitPct => "profit_pct",
            Self::WinRate => "win_rate",
            Self::Composite => "composite",
            Self::RiskAdjusted => "risk_adjusted",
        }
    }
}

impl fmt::Display for ObjectiveMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectiveMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "profit" | "profit_pct" => Ok(Self::ProfitPct),
            "win_rate" | "winrate" => Ok(Self::WinRate),
            "composite" => Ok(Self::Composite),
            "risk_adjusted" | "risk" => Ok(Self::RiskAdjusted),
            other => Err(format!(
                "unknown metric '{other}' (expected profit_pct, win_rate, composite, risk_adjusted)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stats() -> Statistics {
        Statistics {
            trade_count: 20,
            wins: 11,
            losses: 9,
            win_rate: 55.0,
            total_return_pct: 15.0,
            profit_factor: 1.8,
            max_drawdown_pct: 10.0,
            ..Statistics::empty()
        }
    }

    #[test]
    fn profit_and_win_rate_extract() {
        let s = sample_stats();
        assert!((ObjectiveMetric::ProfitPct.score(&s) - 15.0).abs() < 1e-10);
        assert!((ObjectiveMetric::WinRate.score(&s) - 55.0).abs() < 1e-10);
    }

    #[test]
    fn composite_formula() {
        let s = sample_stats();
        // 0.4*15 + 0.03*55 + 0.3*1.8 - 0.2*10 = 6 + 1.65 + 0.54 - 2
        assert!((ObjectiveMetric::Composite.score(&s) - 6.19).abs() < 1e-10);
    }

    #[test]
    fn composite_caps_profit_factor() {
        let s = Statistics {
            profit_factor: 100.0,
            ..sample_stats()
        };
        // 6 + 1.65 + 3 - 2
        assert!((ObjectiveMetric::Composite.score(&s) - 8.65).abs() < 1e-10);
    }

    #[test]
    fn risk_adjusted_floors_drawdown() {
        let s = sample_stats();
        assert!((ObjectiveMetric::RiskAdjusted.score(&s) - 1.5).abs() < 1e-10);

        let shallow = Statistics {
            max_drawdown_pct: 0.2,
            ..sample_stats()
        };
        assert!((ObjectiveMetric::RiskAdjusted.score(&shallow) - 15.0).abs() < 1e-10);
    }

    #[test]
    fn zero_trades_score_zero() {
        let s = Statistics {
            total_return_pct: -3.0,
            max_drawdown_pct: 3.0,
            ..Statistics::empty()
        };
        for metric in ObjectiveMetric::ALL {
            assert_eq!(metric.score(&s), 0.0, "{metric}");
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("composite".parse(), Ok(ObjectiveMetric::Composite));
        assert_eq!("profit".parse(), Ok(ObjectiveMetric::ProfitPct));
        assert_eq!("risk-adjusted".parse(), Ok(ObjectiveMetric::RiskAdjusted));
        assert!("sharpe".parse::<ObjectiveMetric>().is_err());
        for metric in ObjectiveMetric::ALL {
            assert_eq!(metric.name().parse(), Ok(metric));
        }
    }

    #[test]
    fn default_is_composite() {
        assert_eq!(ObjectiveMetric::default(), ObjectiveMetric::Composite);
    }
}
