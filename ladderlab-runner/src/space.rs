//! Parameter space — discretized ranges and their Cartesian product.
//!
//! Enumeration order is lexicographic in range order with the last range
//! varying fastest. A vector is addressed by its enumeration index, so workers
//! can pull indices from a shared cursor without materializing the grid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::optimizer::OptimizeError;

/// Tolerance when deciding whether `min + k·step` is still within `max`.
const STEP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    #[default]
    Float,
}

/// Which part of the strategy a setting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGroup {
    Indicator,
    TakeProfit,
    StopLoss,
    Filter,
}

impl ParamGroup {
    /// Group of a flat setting name, `None` if the name is not optimizable.
    pub fn of(name: &str) -> Option<Self> {
        match name {
            "channel_period" | "channel_multiplier" | "atr_period" => Some(Self::Indicator),
            "stop_loss_pct" | "sl_mode" | "leverage" | "commission_pct" | "commission_enabled"
            | "position_size_pct" | "allow_reentry_after_sl" | "allow_reentry_after_tp" => {
                Some(Self::StopLoss)
            }
            "trend_filter" | "rsi_filter" | "adx_filter" | "volume_filter" | "ema_period"
            | "rsi_period" | "rsi_overbought" | "rsi_oversold" | "adx_period" | "adx_min"
            | "volume_ma_period" => Some(Self::Filter),
            _ if is_ladder_key(name) => Some(Self::TakeProfit),
            _ => None,
        }
    }
}

fn is_ladder_key(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("tp") else {
        return false;
    };
    match rest.split_once('_') {
        Some((num, "target" | "close")) => num.parse::<usize>().is_ok_and(|n| n >= 1),
        _ => false,
    }
}

/// Which groups a search enumerates. Ranges outside the mode are held at the
/// base config's values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Indicator,
    TakeProfit,
    StopLoss,
    Filters,
    #[default]
    Full,
}

impl SearchMode {
    pub fn includes(&self, group: ParamGroup) -> bool {
        matches!(
            (self, group),
            (Self::Full, _)
                | (Self::Indicator, ParamGroup::Indicator)
                | (Self::TakeProfit, ParamGroup::TakeProfit)
                | (Self::StopLoss, ParamGroup::StopLoss)
                | (Self::Filters, ParamGroup::Filter)
        )
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "indicator" | "indicators" => Ok(Self::Indicator),
            "take_profit" | "tp" => Ok(Self::TakeProfit),
            "stop_loss" | "sl" => Ok(Self::StopLoss),
            "filters" | "filter" => Ok(Self::Filters),
            "full" | "all" => Ok(Self::Full),
            other => Err(format!(
                "unknown search mode '{other}' (expected indicator, take_profit, stop_loss, filters, full)"
            )),
        }
    }
}

/// One discretized dimension: `min, min + step, ...` up to `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    #[serde(default)]
    pub kind: ParamKind,
}

impl ParamRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64, step: f64, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            step,
            kind,
        }
    }

    pub fn int(name: impl Into<String>, min: i64, max: i64, step: i64) -> Self {
        Self::new(name, min as f64, max as f64, step as f64, ParamKind::Int)
    }

    pub fn float(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self::new(name, min, max, step, ParamKind::Float)
    }

    pub fn group(&self) -> Option<ParamGroup> {
        ParamGroup::of(&self.name)
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        let invalid = |reason: &str| OptimizeError::InvalidRange {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.group().is_none() {
            return Err(OptimizeError::UnknownParameter(self.name.clone()));
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.step.is_finite()) {
            return Err(invalid("bounds and step must be finite"));
        }
        if self.step <= 0.0 {
            return Err(invalid("step must be greater than 0"));
        }
        if self.min > self.max {
            return Err(invalid("min must not exceed max"));
        }
        if self.kind == ParamKind::Int
            && (self.min.fract() != 0.0 || self.max.fract() != 0.0 || self.step.fract() != 0.0)
        {
            return Err(invalid("int ranges need integral min, max and step"));
        }
        Ok(())
    }

    /// Grid values in ascending order. Assumes a validated range.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        let mut k = 0u64;
        loop {
            let v = self.min + k as f64 * self.step;
            if v > self.max + STEP_TOLERANCE {
                break;
            }
            values.push(match self.kind {
                ParamKind::Int => v.round(),
                ParamKind::Float => v,
            });
            k += 1;
        }
        values
    }
}

/// One named coordinate of a parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub name: String,
    pub value: f64,
}

/// A point in the search space, in range order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamVector {
    pub values: Vec<ParamValue>,
}

impl ParamVector {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|p| p.name == name).map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs, the shape `StrategyConfig::from_pairs` takes.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|p| (p.name.as_str(), p.value))
    }
}

impl fmt::Display for ParamVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", p.name, p.value)?;
        }
        Ok(())
    }
}

/// Validated ranges selected by a search mode, with their grid values.
#[derive(Debug, Clone)]
pub struct ParamSpace {
    ranges: Vec<ParamRange>,
    grid: Vec<Vec<f64>>,
    total: usize,
}

impl ParamSpace {
    /// Validate every range, keep those the mode selects.
    ///
    /// Fails on an unknown or duplicated name, a malformed range, or when the
    /// mode leaves nothing to enumerate.
    pub fn new(ranges: &[ParamRange], mode: SearchMode) -> Result<Self, OptimizeError> {
        for (i, range) in ranges.iter().enumerate() {
            range.validate()?;
            if ranges[..i].iter().any(|r| r.name == range.name) {
                return Err(OptimizeError::InvalidRange {
                    name: range.name.clone(),
                    reason: "duplicate parameter".into(),
                });
            }
        }

        let selected: Vec<ParamRange> = ranges
            .iter()
            .filter(|r| r.group().is_some_and(|g| mode.includes(g)))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(OptimizeError::EmptySpace(format!(
                "no ranges selected by mode {mode:?}"
            )));
        }

        let grid: Vec<Vec<f64>> = selected.iter().map(ParamRange::values).collect();
        let total = grid
            .iter()
            .try_fold(1usize, |acc, values| acc.checked_mul(values.len()))
            .ok_or_else(|| OptimizeError::EmptySpace("grid size overflows usize".into()))?;

        Ok(Self {
            ranges: selected,
            grid,
            total,
        })
    }

    pub fn ranges(&self) -> &[ParamRange] {
        &self.ranges
    }

    /// Grid values of the `i`-th selected range.
    pub fn values(&self, i: usize) -> &[f64] {
        &self.grid[i]
    }

    /// Number of vectors in the Cartesian product.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Vector at enumeration position `index` (last range fastest).
    pub fn vector_at(&self, index: usize) -> Option<ParamVector> {
        if index >= self.total {
            return None;
        }
        let mut rem = index;
        let mut values = vec![0.0; self.grid.len()];
        for (slot, axis) in values.iter_mut().zip(&self.grid).rev() {
            *slot = axis[rem % axis.len()];
            rem /= axis.len();
        }
        Some(ParamVector::new(
            self.ranges
                .iter()
                .zip(values)
                .map(|(r, value)| ParamValue {
                    name: r.name.clone(),
                    value,
                })
                .collect(),
        ))
    }

    /// Every vector in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = ParamVector> + '_ {
        (0..self.total).filter_map(|i| self.vector_at(i))
    }
}
