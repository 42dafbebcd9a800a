//! Stop-loss relocation.
//!
//! Targets by mode, given the levels hit so far:
//! - Fixed: never moves.
//! - AfterTp { k }: entry price once TP_k is hit.
//! - Cascade: entry after TP1; after TP_n (n > 1) the price of TP_{n-1}.
//!
//! Relocation goes through `Position::ratchet_stop`, so the stop only ever
//! moves in the position's favor and re-applying is a no-op.

use crate::domain::{Position, StopLossMode};

/// Where the stop should be under the position's mode, if anywhere new.
pub fn relocation_target(position: &Position) -> Option<f64> {
    match position.stop_mode {
        StopLossMode::Fixed => None,
        StopLossMode::AfterTp { k } => {
            let level = position.levels.get(k.checked_sub(1)?)?;
            level.hit.then_some(position.entry_price)
        }
        StopLossMode::Cascade => {
            let highest = position.highest_hit()?;
            if highest == 0 {
                Some(position.entry_price)
            } else {
                Some(position.levels[highest - 1].price)
            }
        }
    }
}

/// Apply the mode's relocation. Returns true if the stop moved.
pub fn relocate(position: &mut Position) -> bool {
    match relocation_target(position) {
        Some(target) => position.ratchet_stop(target),
        None => false,
    }
}
