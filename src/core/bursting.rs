//! Bursting of columns that became active without being predicted.
//!
//! A column that fires without any of its cells having been predicted signals a prediction
//! failure. Every surviving cell of the column activates (the "burst"), and one of them is chosen
//! as the winner that learns the transition:
//! - the candidate owning the best matching segment, else the least used candidate,
//! - when the winner has no matching segment yet and there are previous winners to learn from,
//!   a new segment is grown on it,
//! - with `learn_on_one_cell` the winner of a column sticks between resets.
//!
//! Dead cells neither burst nor win. A column whose cells are all dead produces no winner.

use super::{
    column::ColumnLayout,
    connections::{CellIdx, CellSet, ColumnSet, Connectivity, SegmentSet},
    fault_mask::CellHealth,
    matching::best_matching_cell,
};
use fxhash::FxHashMap;
use log::{trace, warn};
use rand::Rng;

/// Column index -> the winner cell chosen for that column since the last reset.
pub type ChosenCells = FxHashMap<usize, CellIdx>;

/// The inputs of one bursting pass.
#[derive(Clone, Copy, Debug)]
pub struct BurstInput<'a> {
    /// Columns active at `t`.
    pub active_columns: &'a ColumnSet,

    /// Columns with a correctly predicted cell at `t`.
    pub predicted_columns: &'a ColumnSet,

    /// Internal and external cells active at `t - 1`.
    pub prev_active_cells: &'a CellSet,

    /// Winner cells of `t - 1`.
    pub prev_winner_cells: &'a CellSet,

    /// If true, a column keeps its first winner until the chosen cells are reset.
    pub learn_on_one_cell: bool,
}

/// The outcome of a bursting pass.
#[derive(Clone, Debug, Default)]
pub struct Burst {
    pub active_cells: CellSet,
    pub winner_cells: CellSet,
    pub learning_segments: SegmentSet,
    pub chosen_cell_for_column: ChosenCells,
}

/// Bursts unpredicted columns.
#[derive(Clone, Copy, Debug)]
pub struct ColumnBurster {
    pub layout: ColumnLayout,

    /// Active synapses a segment needs to count as a match for the winner search.
    pub min_threshold: usize,
}

impl ColumnBurster {
    /// Bursts every column in `active_columns - predicted_columns`.
    ///
    /// Columns are processed in ascending order so the random tie breaks are reproducible.
    /// `chosen_cell_for_column` is taken by value, updated, and handed back in the result.
    pub fn burst_columns<C, H, R>(
        &self,
        input: BurstInput<'_>,
        mut chosen_cell_for_column: ChosenCells,
        connections: &mut C,
        health: &H,
        rng: &mut R,
    ) -> Burst
    where
        C: Connectivity + ?Sized,
        H: CellHealth + ?Sized,
        R: Rng + ?Sized,
    {
        let mut active_cells = CellSet::default();
        let mut winner_cells = CellSet::default();
        let mut learning_segments = SegmentSet::default();

        let mut unpredicted_columns: Vec<usize> = input
            .active_columns
            .difference(input.predicted_columns)
            .copied()
            .collect();
        unpredicted_columns.sort_unstable();

        for column in unpredicted_columns {
            let survivors: Vec<CellIdx> = self
                .layout
                .cells_for_column(column)
                .filter(|&cell| !health.is_dead(cell))
                .collect();
            let num_survivors = survivors.len();
            active_cells.extend(survivors.iter().copied());

            let mut candidates = survivors;

            if input.learn_on_one_cell {
                if let Some(&chosen) = chosen_cell_for_column.get(&column) {
                    if health.is_dead(chosen) {
                        warn!(
                            "Chosen cell {} of column {} is dead, picking a new winner",
                            chosen, column
                        );
                    } else {
                        candidates = vec![chosen];
                    }
                }
            }

            let best = match best_matching_cell(
                &candidates,
                input.prev_active_cells,
                &*connections,
                self.min_threshold,
                rng,
            ) {
                Some(best) => best,
                None => {
                    trace!("Column {} has no surviving cells", column);
                    chosen_cell_for_column.remove(&column);
                    continue;
                }
            };

            winner_cells.insert(best.cell);

            let segment = match best.segment {
                Some(segment) => Some(segment),
                None if !input.prev_winner_cells.is_empty() => {
                    Some(connections.create_segment(best.cell))
                }
                None => None,
            };

            if let Some(segment) = segment {
                learning_segments.insert(segment);
            }

            trace!(
                "Column {} burst {} cells, winner {} (segment {:?})",
                column,
                num_survivors,
                best.cell,
                segment
            );

            chosen_cell_for_column.insert(column, best.cell);
        }

        Burst {
            active_cells,
            winner_cells,
            learning_segments,
            chosen_cell_for_column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        connections::Connections,
        fault_mask::{AllAlive, FaultMask},
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn set(list: &[usize]) -> CellSet {
        list.iter().copied().collect()
    }

    fn burster(num_columns: usize, cells_per_column: usize) -> ColumnBurster {
        ColumnBurster {
            layout: ColumnLayout::new(num_columns, cells_per_column),
            min_threshold: 1,
        }
    }

    fn input<'a>(
        active_columns: &'a ColumnSet,
        predicted_columns: &'a ColumnSet,
        prev_active_cells: &'a CellSet,
        prev_winner_cells: &'a CellSet,
        learn_on_one_cell: bool,
    ) -> BurstInput<'a> {
        BurstInput {
            active_columns,
            predicted_columns,
            prev_active_cells,
            prev_winner_cells,
            learn_on_one_cell,
        }
    }

    #[test]
    fn dead_cell_is_excluded_from_burst() {
        let mut connections = Connections::new(2);
        let mask = FaultMask::from_cells([1]);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, empty) = (set(&[0]), set(&[]), set(&[]));

        let burst = burster(1, 2).burst_columns(
            input(&active, &predicted, &empty, &empty, false),
            ChosenCells::default(),
            &mut connections,
            &mask,
            &mut rng,
        );

        assert_eq!(burst.active_cells, set(&[0]));
        assert_eq!(burst.winner_cells, set(&[0]));
        assert_eq!(burst.chosen_cell_for_column.get(&0), Some(&0));
    }

    #[test]
    fn predicted_columns_do_not_burst() {
        let mut connections = Connections::new(8);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, empty) = (set(&[0, 1]), set(&[1]), set(&[]));

        let burst = burster(2, 4).burst_columns(
            input(&active, &predicted, &empty, &empty, false),
            ChosenCells::default(),
            &mut connections,
            &AllAlive,
            &mut rng,
        );

        assert_eq!(burst.active_cells, set(&[0, 1, 2, 3]));
        assert_eq!(burst.winner_cells.len(), 1);
        assert!(burst.winner_cells.iter().all(|&cell| cell < 4));
    }

    #[test]
    fn one_winner_per_column_with_survivors() {
        let mut connections = Connections::new(12);
        let mask = FaultMask::from_cells([3, 4, 5, 7]);
        let mut rng = StdRng::seed_from_u64(5);
        let (active, predicted, empty) = (set(&[0, 1, 2, 3]), set(&[]), set(&[]));

        let burst = burster(4, 3).burst_columns(
            input(&active, &predicted, &empty, &empty, false),
            ChosenCells::default(),
            &mut connections,
            &mask,
            &mut rng,
        );

        // Column 1 (cells 3..6) is entirely dead.
        assert_eq!(burst.winner_cells.len(), 3);
        assert_eq!(burst.active_cells, set(&[0, 1, 2, 6, 8, 9, 10, 11]));
        assert!(!burst.chosen_cell_for_column.contains_key(&1));
        for cell in &burst.winner_cells {
            assert!(!mask.is_dead(*cell));
        }
    }

    #[test]
    fn segment_grows_only_with_previous_winners() {
        let mut connections = Connections::new(4);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, empty) = (set(&[0]), set(&[]), set(&[]));

        let burst = burster(1, 4).burst_columns(
            input(&active, &predicted, &empty, &empty, false),
            ChosenCells::default(),
            &mut connections,
            &AllAlive,
            &mut rng,
        );
        assert!(burst.learning_segments.is_empty());
        assert_eq!(connections.num_segments(), 0);

        let prev_winners = set(&[9]);
        let burst = burster(1, 4).burst_columns(
            input(&active, &predicted, &empty, &prev_winners, false),
            ChosenCells::default(),
            &mut connections,
            &AllAlive,
            &mut rng,
        );
        assert_eq!(burst.learning_segments.len(), 1);
        assert_eq!(connections.num_segments(), 1);

        let winner = burst.winner_cells.iter().copied().next();
        let segment = burst.learning_segments.iter().copied().next();
        assert_eq!(segment.map(|s| connections.cell_for_segment(s)), winner);
    }

    #[test]
    fn matching_segment_is_reused() {
        let mut connections = Connections::new(4);
        let segment = connections.create_segment(2);
        connections.create_synapse(segment, 0, 0.3);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, prev_active) = (set(&[0]), set(&[]), set(&[0]));
        let prev_winners = set(&[0]);

        let burst = burster(1, 4).burst_columns(
            input(&active, &predicted, &prev_active, &prev_winners, false),
            ChosenCells::default(),
            &mut connections,
            &AllAlive,
            &mut rng,
        );

        assert_eq!(burst.winner_cells, set(&[2]));
        assert_eq!(burst.learning_segments, [segment].into_iter().collect::<SegmentSet>());
        assert_eq!(connections.num_segments(), 1);
    }

    #[test]
    fn sticky_winner_is_kept() {
        let mut connections = Connections::new(4);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, empty) = (set(&[0]), set(&[]), set(&[]));
        let mut chosen = ChosenCells::default();
        chosen.insert(0, 3);

        let burst = burster(1, 4).burst_columns(
            input(&active, &predicted, &empty, &empty, true),
            chosen,
            &mut connections,
            &AllAlive,
            &mut rng,
        );

        assert_eq!(burst.active_cells, set(&[0, 1, 2, 3]));
        assert_eq!(burst.winner_cells, set(&[3]));
        assert_eq!(burst.chosen_cell_for_column.get(&0), Some(&3));
    }

    #[test]
    fn dead_sticky_winner_is_replaced() {
        let mut connections = Connections::new(4);
        let mask = FaultMask::from_cells([3]);
        let mut rng = StdRng::seed_from_u64(0);
        let (active, predicted, empty) = (set(&[0]), set(&[]), set(&[]));
        let mut chosen = ChosenCells::default();
        chosen.insert(0, 3);

        let burst = burster(1, 4).burst_columns(
            input(&active, &predicted, &empty, &empty, true),
            chosen,
            &mut connections,
            &mask,
            &mut rng,
        );

        assert_eq!(burst.active_cells, set(&[0, 1, 2]));
        assert_eq!(burst.winner_cells.len(), 1);
        assert!(!burst.winner_cells.contains(&3));
        let winner = burst.winner_cells.iter().copied().next();
        assert_eq!(burst.chosen_cell_for_column.get(&0).copied(), winner);
    }
}
