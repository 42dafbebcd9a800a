//! Domain types for LadderLab

pub mod candle;
pub mod exit_plan;
pub mod position;
pub mod trade;

pub use candle::{first_invalid_candle, Candle};
pub use exit_plan::{LadderError, StopLossMode, TakeProfitLadder, TakeProfitLevel, MAX_TP_LEVELS};
pub use position::{
    Direction, ExitFill, LevelState, Position, PositionEntry, PositionError, PositionStatus,
    MAX_LOSS_PCT, SIZE_EPSILON,
};
pub use trade::{ExitReason, TradeRecord};
