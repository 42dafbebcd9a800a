//! Signal generation — turns channel state into directional entries.
//!
//! Signals never look at positions or equity. The only state carried across
//! candles is the pair of trend flags in [`TrendState`], owned by whoever
//! drives the candle loop.

pub mod generator;

pub use generator::{generate, SignalGenerator, TrendState};

use serde::{Deserialize, Serialize};

use crate::domain::Direction;

/// Output of the generator for one candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    /// `None` = no entry on this candle.
    pub direction: Option<Direction>,
    /// Candle close; the price an entry would fill at.
    pub price: f64,
    /// Entry conditions for this direction held, but its trend flag was
    /// already set. Only the re-entry policy acts on this.
    pub reentry: Option<Direction>,
}

impl Signal {
    pub fn none(index: usize, price: f64) -> Self {
        Self {
            index,
            direction: None,
            price,
            reentry: None,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.direction.is_some()
    }
}
