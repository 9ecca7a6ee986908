//! A `ColumnLayout` describes how the cells of the temporal memory are grouped into columns.
//!
//! Biological inspiration:
//! Columns in HTM are inspired by cortical mini-columns found in the brain.
//! They consist of a group of neurons, which in HTM are modeled as "cells".
//!
//! Meaning in the temporal memory:
//! Every cell is a plain index in `[0, number_of_cells)`. The cells of one column occupy a
//! contiguous block of indices, so the column of a cell is `cell / cells_per_column`.
//! All cells of a column share the same feed-forward input, and the different cells
//! represent the same input in different temporal contexts.

use super::connections::CellIdx;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The fixed shape of the cell population: `num_columns` columns of `cells_per_column` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// The number of columns.
    pub num_columns: usize,

    /// The number of cells in every column.
    pub cells_per_column: usize,
}

impl ColumnLayout {
    /// Creates a new layout.
    #[inline]
    pub fn new(num_columns: usize, cells_per_column: usize) -> Self {
        Self {
            num_columns,
            cells_per_column,
        }
    }

    /// The total number of cells.
    #[inline]
    pub fn number_of_cells(&self) -> usize {
        self.num_columns * self.cells_per_column
    }

    /// Returns the column a cell belongs to.
    ///
    /// Panics if `cell` lies outside the cell index space.
    #[inline]
    pub fn column_for_cell(&self, cell: CellIdx) -> usize {
        assert!(
            cell < self.number_of_cells(),
            "Cell {} is outside of [0, {})",
            cell,
            self.number_of_cells()
        );
        cell / self.cells_per_column
    }

    /// Returns the index range of all cells in a column.
    ///
    /// Panics if `column` lies outside the column index space.
    #[inline]
    pub fn cells_for_column(&self, column: usize) -> Range<CellIdx> {
        assert!(
            column < self.num_columns,
            "Column {} is outside of [0, {})",
            column,
            self.num_columns
        );
        let start = column * self.cells_per_column;
        start..start + self.cells_per_column
    }

    /// Returns true if `cell` is a valid cell index.
    #[inline]
    pub fn contains_cell(&self, cell: CellIdx) -> bool {
        cell < self.number_of_cells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_to_columns() {
        let layout = ColumnLayout::new(4, 3);

        assert_eq!(layout.number_of_cells(), 12);
        assert_eq!(layout.column_for_cell(0), 0);
        assert_eq!(layout.column_for_cell(5), 1);
        assert_eq!(layout.column_for_cell(11), 3);
        assert_eq!(layout.cells_for_column(2), 6..9);
        assert!(layout.contains_cell(11));
        assert!(!layout.contains_cell(12));
    }

    #[test]
    #[should_panic(expected = "outside of")]
    fn out_of_range_cell_panics() {
        ColumnLayout::new(2, 2).column_for_cell(4);
    }

    #[test]
    #[should_panic(expected = "outside of")]
    fn out_of_range_column_panics() {
        let _ = ColumnLayout::new(2, 2).cells_for_column(2);
    }
}
