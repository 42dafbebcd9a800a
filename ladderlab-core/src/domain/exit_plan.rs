//! Exit plan — take-profit ladder and stop-loss relocation mode.
//!
//! The ladder is validated once at construction. A ladder that exists is
//! always well-formed: 1–10 levels, strictly increasing targets, close
//! percentages summing to at most 100.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::position::Direction;

/// Maximum number of take-profit levels per ladder.
pub const MAX_TP_LEVELS: usize = 10;

/// One rung of the take-profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    /// Favorable move from entry, in percent (1.0 = 1%).
    pub target_pct: f64,
    /// Percent of the ORIGINAL position size closed when this level is hit.
    pub close_pct: f64,
}

impl TakeProfitLevel {
    pub fn new(target_pct: f64, close_pct: f64) -> Self {
        Self {
            target_pct,
            close_pct,
        }
    }

    /// Absolute price at which this level triggers for a position.
    pub fn price(&self, entry_price: f64, direction: Direction) -> f64 {
        match direction {
            Direction::Long => entry_price * (1.0 + self.target_pct / 100.0),
            Direction::Short => entry_price * (1.0 - self.target_pct / 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LadderError {
    #[error("take-profit ladder needs 1..={MAX_TP_LEVELS} levels, got {0}")]
    LevelCount(usize),
    #[error("TP{level}: target {target}% must be in (0, 100]")]
    TargetOutOfBounds { level: usize, target: f64 },
    #[error("TP{level}: close {close}% must be in (0, 100]")]
    CloseOutOfBounds { level: usize, close: f64 },
    #[error("TP{level}: target {target}% does not exceed previous target {previous}%")]
    NonMonotonic {
        level: usize,
        target: f64,
        previous: f64,
    },
    #[error("close percentages sum to {0}%, must be <= 100")]
    CloseSumExceeded(f64),
}

/// Ordered, validated list of take-profit levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TakeProfitLevel>", into = "Vec<TakeProfitLevel>")]
pub struct TakeProfitLadder {
    levels: Vec<TakeProfitLevel>,
}

impl TakeProfitLadder {
    pub fn new(levels: Vec<TakeProfitLevel>) -> Result<Self, LadderError> {
        if levels.is_empty() || levels.len() > MAX_TP_LEVELS {
            return Err(LadderError::LevelCount(levels.len()));
        }

        let mut previous: Option<f64> = None;
        let mut sum = 0.0;
        for (i, level) in levels.iter().enumerate() {
            let n = i + 1;
            if !(level.target_pct > 0.0 && level.target_pct <= 100.0) {
                return Err(LadderError::TargetOutOfBounds {
                    level: n,
                    target: level.target_pct,
                });
            }
            if !(level.close_pct > 0.0 && level.close_pct <= 100.0) {
                return Err(LadderError::CloseOutOfBounds {
                    level: n,
                    close: level.close_pct,
                });
            }
            if let Some(prev) = previous {
                if level.target_pct <= prev {
                    return Err(LadderError::NonMonotonic {
                        level: n,
                        target: level.target_pct,
                        previous: prev,
                    });
                }
            }
            previous = Some(level.target_pct);
            sum += level.close_pct;
        }

        // Tolerate float noise from e.g. 3 x 33.333...
        if sum > 100.0 + 1e-9 {
            return Err(LadderError::CloseSumExceeded(sum));
        }

        Ok(Self { levels })
    }

    /// Build from `(target_pct, close_pct)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, LadderError> {
        Self::new(
            pairs
                .iter()
                .map(|&(t, c)| TakeProfitLevel::new(t, c))
                .collect(),
        )
    }

    pub fn levels(&self) -> &[TakeProfitLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Sum of close percentages across all levels.
    pub fn total_close_pct(&self) -> f64 {
        self.levels.iter().map(|l| l.close_pct).sum()
    }

    /// Part of the position that no level closes (closed at final exit).
    pub fn remainder_pct(&self) -> f64 {
        (100.0 - self.total_close_pct()).max(0.0)
    }
}

impl TryFrom<Vec<TakeProfitLevel>> for TakeProfitLadder {
    type Error = LadderError;

    fn try_from(levels: Vec<TakeProfitLevel>) -> Result<Self, Self::Error> {
        Self::new(levels)
    }
}

impl From<TakeProfitLadder> for Vec<TakeProfitLevel> {
    fn from(ladder: TakeProfitLadder) -> Self {
        ladder.levels
    }
}

/// Stop-loss relocation policy.
///
/// - `Fixed`: SL stays at its initial percent-based price.
/// - `AfterTp { k }`: SL snaps to entry once TP_k is hit (k in 1..=3).
/// - `Cascade`: after TP_n, SL snaps to TP_{n-1}'s price (entry after TP1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossMode {
    #[default]
    Fixed,
    AfterTp { k: usize },
    Cascade,
}

impl StopLossMode {
    /// Decode the numeric form used by flat settings and parameter grids:
    /// 0 = fixed, 1..=3 = after-Kth-TP, 4 = cascade.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Fixed),
            1..=3 => Some(Self::AfterTp { k: code as usize }),
            4 => Some(Self::Cascade),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Fixed => 0,
            Self::AfterTp { k } => *k as i64,
            Self::Cascade => 4,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Fixed => "fixed".to_string(),
            Self::AfterTp { k } => format!("after_tp{k}"),
            Self::Cascade => "cascade".to_string(),
        }
    }
}
