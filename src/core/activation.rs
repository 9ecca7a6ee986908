//! Activation of correctly predicted cells.
//!
//! A cell that was predictive at `t - 1` and whose column is active at `t` was predicted
//! correctly: it becomes both active and a winner, and its column counts as predicted, so it will
//! not burst.
//!
//! A cell that was matching at `t - 1` but whose column stays inactive is an orphan. Its matching
//! segments anticipated activity that never came, and learning may punish them.

use super::{
    column::ColumnLayout,
    connections::{CellSet, ColumnSet},
};

/// The outcome of activating correctly predicted cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrectPredictions {
    pub active_cells: CellSet,
    pub winner_cells: CellSet,
    pub predicted_columns: ColumnSet,

    /// Cells matching at `t - 1` whose column is not active at `t`.
    pub orphan_cells: CellSet,
}

/// Activates the previously predictive cells of active columns and collects orphan cells.
pub fn activate_correctly_predictive_cells(
    prev_predictive_cells: &CellSet,
    prev_matching_cells: &CellSet,
    active_columns: &ColumnSet,
    layout: &ColumnLayout,
) -> CorrectPredictions {
    let mut result = CorrectPredictions::default();

    for &cell in prev_predictive_cells {
        let column = layout.column_for_cell(cell);

        if active_columns.contains(&column) {
            result.active_cells.insert(cell);
            result.winner_cells.insert(cell);
            result.predicted_columns.insert(column);
        }
    }

    for &cell in prev_matching_cells {
        if !active_columns.contains(&layout.column_for_cell(cell)) {
            result.orphan_cells.insert(cell);
        }
    }

    result
}
