//! Position — the mutable core entity of the lifecycle simulator.
//!
//! A position is opened from an allowed signal, mutated candle by candle,
//! and converted into an immutable `TradeRecord` once `remaining_pct`
//! reaches zero. Size bookkeeping is in percent of the ORIGINAL size.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::candle::Candle;
use super::exit_plan::{StopLossMode, TakeProfitLadder, TakeProfitLevel};
use super::trade::ExitReason;

/// Tolerance for percent bookkeeping (sizes are sums of user percentages).
pub const SIZE_EPSILON: f64 = 1e-9;

/// Most a position can lose, in percent of its capital-at-risk (liquidation).
pub const MAX_LOSS_PCT: f64 = 100.0;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position {id}: cannot close {requested}% with {remaining}% remaining")]
    SizeOutOfRange {
        id: u64,
        requested: f64,
        remaining: f64,
    },
    #[error("position {0} is already closed")]
    AlreadyClosed(u64),
}

/// A take-profit level with its absolute price and hit flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelState {
    pub level: TakeProfitLevel,
    pub price: f64,
    pub hit: bool,
}

/// One closing event (partial or final).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub price: f64,
    /// Percent of the original size closed by this fill.
    pub size_pct: f64,
    /// Net PnL contributed by this fill, in percent of capital-at-risk.
    pub pnl_pct: f64,
    pub reason: ExitReason,
}

/// Entry-time facts about a new position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    pub id: u64,
    pub direction: Direction,
    pub index: usize,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub capital_at_risk: f64,
    pub leverage: f64,
    pub is_reentry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub capital_at_risk: f64,
    pub levels: Vec<LevelState>,
    pub stop_loss: f64,
    pub initial_stop_loss: f64,
    pub stop_mode: StopLossMode,
    pub status: PositionStatus,
    /// Percent of the original size still open (100 → 0).
    pub remaining_pct: f64,
    /// Net realized PnL in percent of capital-at-risk (after leverage and commission).
    pub realized_pnl_pct: f64,
    /// Best price seen since entry (highest high for long, lowest low for short).
    pub extreme_price: f64,
    /// Worst price seen since entry.
    pub adverse_price: f64,
    pub leverage: f64,
    /// Commission charged so far, in percent of capital-at-risk.
    pub commission_paid_pct: f64,
    pub is_reentry: bool,
    pub fills: Vec<ExitFill>,
}

impl Position {
    /// Open a position with its ladder and initial stop `stop_loss_pct` away from entry.
    pub fn open(
        entry: PositionEntry,
        ladder: &TakeProfitLadder,
        stop_loss_pct: f64,
        stop_mode: StopLossMode,
    ) -> Self {
        let levels = ladder
            .levels()
            .iter()
            .map(|&level| LevelState {
                level,
                price: level.price(entry.price, entry.direction),
                hit: false,
            })
            .collect();
        let stop_loss = match entry.direction {
            Direction::Long => entry.price * (1.0 - stop_loss_pct / 100.0),
            Direction::Short => entry.price * (1.0 + stop_loss_pct / 100.0),
        };

        Self {
            id: entry.id,
            direction: entry.direction,
            entry_index: entry.index,
            entry_time: entry.time,
            entry_price: entry.price,
            capital_at_risk: entry.capital_at_risk,
            levels,
            stop_loss,
            initial_stop_loss: stop_loss,
            stop_mode,
            status: PositionStatus::Open,
            remaining_pct: 100.0,
            realized_pnl_pct: 0.0,
            extreme_price: entry.price,
            adverse_price: entry.price,
            leverage: entry.leverage,
            commission_paid_pct: 0.0,
            is_reentry: entry.is_reentry,
            fills: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    /// Signed price move from entry in percent (positive = in our favor).
    pub fn favorable_move_pct(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Unrealized PnL of the open remainder at `price`, percent of capital-at-risk.
    pub fn unrealized_pnl_pct(&self, price: f64) -> f64 {
        let raw = self.favorable_move_pct(price) * self.leverage * self.remaining_pct / 100.0;
        raw.max(self.loss_headroom())
    }

    /// Largest further loss allowed before the position is wiped out (<= 0).
    fn loss_headroom(&self) -> f64 {
        (-MAX_LOSS_PCT - self.realized_pnl_pct).min(0.0)
    }

    /// Charge the entry commission (on the full leveraged notional), capped
    /// at the capital-at-risk. Returns the amount charged.
    pub fn charge_entry_commission(&mut self, commission_pct: f64) -> f64 {
        let cost = (commission_pct * self.leverage).min(-self.loss_headroom());
        self.commission_paid_pct += cost;
        self.realized_pnl_pct -= cost;
        cost
    }

    /// Close `size_pct` percent of the original size at `price`.
    ///
    /// Returns the net PnL contributed by this fill. The remaining size can
    /// never go below zero: a request larger than what is open is an error.
    /// Losses stop at [`MAX_LOSS_PCT`] of capital-at-risk across all fills.
    pub fn close_portion(
        &mut self,
        size_pct: f64,
        price: f64,
        candle: &Candle,
        index: usize,
        reason: ExitReason,
        commission_pct: f64,
    ) -> Result<f64, PositionError> {
        if self.is_closed() {
            return Err(PositionError::AlreadyClosed(self.id));
        }
        if !(size_pct > 0.0) || size_pct > self.remaining_pct + SIZE_EPSILON {
            return Err(PositionError::SizeOutOfRange {
                id: self.id,
                requested: size_pct,
                remaining: self.remaining_pct,
            });
        }

        let fraction = size_pct / 100.0;
        let gross = self.favorable_move_pct(price) * self.leverage * fraction;
        let commission = commission_pct * self.leverage * fraction;
        let net = (gross - commission).max(self.loss_headroom());

        self.remaining_pct -= size_pct;
        if self.remaining_pct < SIZE_EPSILON {
            self.remaining_pct = 0.0;
        }
        self.realized_pnl_pct += net;
        self.commission_paid_pct += commission;
        self.status = if self.remaining_pct == 0.0 {
            PositionStatus::Closed
        } else {
            PositionStatus::PartiallyClosed
        };
        self.fills.push(ExitFill {
            index,
            time: candle.timestamp,
            price,
            size_pct,
            pnl_pct: net,
            reason,
        });

        Ok(net)
    }

    /// Close everything still open.
    pub fn close_all(
        &mut self,
        price: f64,
        candle: &Candle,
        index: usize,
        reason: ExitReason,
        commission_pct: f64,
    ) -> Result<f64, PositionError> {
        let remaining = self.remaining_pct;
        self.close_portion(remaining, price, candle, index, reason, commission_pct)
    }

    /// Move the stop only in the favorable direction (ratchet).
    ///
    /// Returns true if the stop moved.
    pub fn ratchet_stop(&mut self, new_stop: f64) -> bool {
        let improves = match self.direction {
            Direction::Long => new_stop > self.stop_loss,
            Direction::Short => new_stop < self.stop_loss,
        };
        if improves {
            self.stop_loss = new_stop;
        }
        improves
    }

    /// Track the best and worst prices seen while the position is open.
    pub fn observe(&mut self, candle: &Candle) {
        match self.direction {
            Direction::Long => {
                self.extreme_price = self.extreme_price.max(candle.high);
                self.adverse_price = self.adverse_price.min(candle.low);
            }
            Direction::Short => {
                self.extreme_price = self.extreme_price.min(candle.low);
                self.adverse_price = self.adverse_price.max(candle.high);
            }
        }
    }

    /// 1-based numbers of the levels hit so far, in ascending order.
    pub fn hit_levels(&self) -> Vec<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.hit)
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// 0-based index of the highest level hit so far.
    pub fn highest_hit(&self) -> Option<usize> {
        self.levels.iter().rposition(|l| l.hit)
    }

    pub fn stop_hit_by(&self, candle: &Candle) -> bool {
        match self.direction {
            Direction::Long => candle.low <= self.stop_loss,
            Direction::Short => candle.high >= self.stop_loss,
        }
    }

    pub fn level_hit_by(&self, level: &LevelState, candle: &Candle) -> bool {
        match self.direction {
            Direction::Long => candle.high >= level.price,
            Direction::Short => candle.low <= level.price,
        }
    }
}
