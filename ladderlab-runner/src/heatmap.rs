//! Two-dimensional sweep: a dense score matrix over two ranges.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::optimizer::{
    Objective, OptimizationResult, OptimizeError, Optimizer, OptimizerEvent,
};
use crate::space::{ParamRange, ParamSpace, SearchMode};

/// `scores[y][x]`; `None` where the cell failed or was never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub x_name: String,
    pub y_name: String,
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub scores: Vec<Vec<Option<f64>>>,
    pub best: Option<OptimizationResult>,
}

impl Heatmap {
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        self.scores.get(y)?.get(x).copied().flatten()
    }

    /// `(x, y)` cell of the best result.
    pub fn best_cell(&self) -> Option<(usize, usize)> {
        let best = self.best.as_ref()?;
        let nx = self.x_values.len();
        (nx > 0).then(|| (best.index % nx, best.index / nx))
    }
}

/// Evaluate the dense `x × y` grid through the optimizer's worker pool.
///
/// Both ranges are enumerated regardless of the optimizer's search mode.
pub fn run_heatmap<O: Objective + ?Sized>(
    optimizer: &Optimizer,
    x: &ParamRange,
    y: &ParamRange,
    objective: &O,
    events: Option<&SyncSender<OptimizerEvent>>,
    cancel: Option<&AtomicBool>,
) -> Result<Heatmap, OptimizeError> {
    // y outer, x inner: index = yi * nx + xi.
    let space = ParamSpace::new(&[y.clone(), x.clone()], SearchMode::Full)?;
    let y_values = space.values(0).to_vec();
    let x_values = space.values(1).to_vec();

    let cells = Mutex::new(vec![None; space.total()]);
    let summary = optimizer.drive(&space, objective, events, cancel, Some(&cells))?;
    let flat = cells.into_inner().unwrap_or_else(PoisonError::into_inner);

    let scores = if x_values.is_empty() {
        Vec::new()
    } else {
        flat.chunks(x_values.len()).map(<[_]>::to_vec).collect()
    };

    Ok(Heatmap {
        x_name: x.name.clone(),
        y_name: y.name.clone(),
        x_values,
        y_values,
        scores,
        best: summary.best,
    })
}
