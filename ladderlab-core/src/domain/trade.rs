//! TradeRecord — immutable snapshot of a closed position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::{Direction, ExitFill, Position};
use crate::scoring::ScoreBreakdown;

/// Why a position (or part of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    /// 1-based take-profit level number.
    TakeProfit(usize),
    SignalReversal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss => write!(f, "SL"),
            Self::TakeProfit(n) => write!(f, "TP{n}"),
            Self::SignalReversal => write!(f, "signal_reversal"),
            Self::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// A complete round-trip trade: entry → final exit, with every partial fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: u64,
    pub direction: Direction,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    /// Price of the final closing event.
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// 1-based take-profit levels hit, ascending.
    pub tp_hits: Vec<usize>,
    pub fills: Vec<ExitFill>,

    // ── PnL (percent of capital-at-risk) ──
    pub capital_at_risk: f64,
    pub leverage: f64,
    pub commission_pct: f64,
    /// Leveraged price move before commission.
    pub gross_pnl_pct: f64,
    pub net_pnl_pct: f64,

    // ── Excursion (unleveraged price move, percent) ──
    pub mfe_pct: f64,
    pub mae_pct: f64,

    pub bars_held: usize,
    pub is_reentry: bool,
    pub stop_mode: String,

    /// Signal quality annotation. Never influences the trade itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreBreakdown>,
}

impl TradeRecord {
    /// Snapshot a closed position. Returns `None` while the position is still open.
    pub fn from_position(position: &Position) -> Option<Self> {
        if !position.is_closed() {
            return None;
        }
        let last = position.fills.last()?;

        Some(Self {
            id: position.id,
            direction: position.direction,
            entry_index: position.entry_index,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_index: last.index,
            exit_time: last.time,
            exit_price: last.price,
            exit_reason: last.reason,
            tp_hits: position.hit_levels(),
            fills: position.fills.clone(),
            capital_at_risk: position.capital_at_risk,
            leverage: position.leverage,
            commission_pct: position.commission_paid_pct,
            gross_pnl_pct: position.realized_pnl_pct + position.commission_paid_pct,
            net_pnl_pct: position.realized_pnl_pct,
            mfe_pct: position.favorable_move_pct(position.extreme_price),
            mae_pct: position.favorable_move_pct(position.adverse_price),
            bars_held: last.index.saturating_sub(position.entry_index),
            is_reentry: position.is_reentry,
            stop_mode: position.stop_mode.label(),
            score: None,
        })
    }

    /// Net PnL in account currency.
    pub fn net_pnl(&self) -> f64 {
        self.capital_at_risk * self.net_pnl_pct / 100.0
    }

    /// Size-weighted average exit price across all fills.
    pub fn avg_exit_price(&self) -> f64 {
        let size: f64 = self.fills.iter().map(|f| f.size_pct).sum();
        if size <= 0.0 {
            return self.exit_price;
        }
        self.fills.iter().map(|f| f.price * f.size_pct).sum::<f64>() / size
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl_pct > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_plan::{StopLossMode, TakeProfitLadder};
    use crate::domain::position::PositionEntry;
    use crate::domain::Candle;
    use chrono::TimeZone;

    fn closed_position() -> Position {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let ladder = TakeProfitLadder::from_pairs(&[(1.0, 50.0), (2.0, 50.0)]).unwrap();
        let mut pos = Position::open(
            PositionEntry {
                id: 7,
                direction: Direction::Long,
                index: 0,
                time: t0,
                price: 100.0,
                capital_at_risk: 1000.0,
                leverage: 1.0,
                is_reentry: true,
            },
            &ladder,
            5.0,
            StopLossMode::Fixed,
        );
        let c = Candle::new(t0 + chrono::Duration::days(2), 100.0, 103.0, 99.5, 102.5, 10.0);
        pos.levels[0].hit = true;
        pos.close_portion(50.0, 101.0, &c, 2, ExitReason::TakeProfit(1), 0.0)
            .unwrap();
        pos.levels[1].hit = true;
        pos.close_portion(50.0, 102.0, &c, 2, ExitReason::TakeProfit(2), 0.0)
            .unwrap();
        pos.observe(&c);
        pos
    }

    #[test]
    fn snapshot_of_closed_position() {
        let trade = TradeRecord::from_position(&closed_position()).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit(2));
        assert_eq!(trade.tp_hits, vec![1, 2]);
        assert!((trade.net_pnl_pct - 1.5).abs() < 1e-12);
        assert!((trade.net_pnl() - 15.0).abs() < 1e-9);
        assert!((trade.avg_exit_price() - 101.5).abs() < 1e-12);
        assert_eq!(trade.bars_held, 2);
        assert!(trade.is_reentry);
        assert!(trade.is_winner());
        assert!((trade.mfe_pct - 3.0).abs() < 1e-9);
    }

    #[test]
    fn open_position_has_no_snapshot() {
        let mut pos = closed_position();
        pos.status = crate::domain::PositionStatus::Open;
        assert!(TradeRecord::from_position(&pos).is_none());
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::TakeProfit(2).to_string(), "TP2");
        assert_eq!(ExitReason::StopLoss.to_string(), "SL");
        assert_eq!(ExitReason::SignalReversal.to_string(), "signal_reversal");
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = TradeRecord::from_position(&closed_position()).unwrap();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
