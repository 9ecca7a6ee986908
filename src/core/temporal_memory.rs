//! The `TemporalMemory` module implements a core component of HTM that learns and predicts temporal sequences.
//!
//! At a high level, it models a set of columns, where each column contains multiple cells.
//! Each cell can form multiple dendritic segments, which in turn consist of synapses.
//!
//! Column:
//! - A group of cells that share common input.
//!
//! Cell:
//! - An individual processing unit within a column.
//! - Cells are responsible for representing different contexts of the same input.
//!
//! Dendritic Segment (Segment):
//! - A cluster of synapses on a cell that detects patterns of activity from other cells.
//!
//! Synapse:
//! - A connection from a presynaptic cell to a dendritic segment, with a permanence value.
//!
//! Bursting:
//! - When a column becomes active but no cell in it was correctly predicted, all cells in the column are activated.
//!
//! How It Works:
//! - The Temporal Memory processes input in discrete time steps. Each step runs four phases in a fixed order:
//! - 1. Cells predicted at `t - 1` whose column is now active become active and win.
//! - 2. Active columns without a correct prediction burst and pick a winner to learn.
//! - 3. If learning is enabled, the segments involved in the transition are adapted.
//! - 4. Activity is propagated along the distal synapses to compute the predictive state for `t + 1`.
//!
//! The engine is a pure step function: the previous `TimestepState` goes in, the next one comes out.
//! Only the connectivity graph is mutated. Phases 2 and 4 are provided by a `Phases` strategy so that
//! variants such as the fault-injecting memory can substitute their own behavior.

use super::{
    activation::activate_correctly_predictive_cells,
    bursting::{Burst, BurstInput, ChosenCells, ColumnBurster},
    column::ColumnLayout,
    connections::{CellIdx, CellSet, ColumnSet, Connectivity, Permanence, SegmentSet},
    fault_mask::AllAlive,
    learning::{Learner, LearningInput},
    propagation::{Predictions, Propagator},
};
use anyhow::{ensure, Result};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Holds the parameters required for the Temporal Memory algorithm's learning and activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalMemoryParams {
    pub num_columns: usize,
    pub cells_per_column: usize,
    /// Connected active synapses a segment needs to become active.
    pub activation_threshold: usize,
    /// Potential active synapses a segment needs to become matching.
    pub min_threshold: usize,
    pub connected_permanence: Permanence,
    pub initial_permanence: Permanence,
    pub permanence_increment: Permanence,
    pub permanence_decrement: Permanence,
    /// Punishment of segments that matched on cells whose column stayed inactive. Zero disables it.
    pub predicted_segment_decrement: Permanence,
    pub max_new_synapse_count: usize,
    /// Number of external cells that can provide context, indexed after the internal cells.
    pub num_external_cells: usize,
    /// If true, segments grow synapses to previous internal winner cells, not only external cells.
    pub form_internal_connections: bool,
    /// If true, a bursting column keeps its first winner cell until the next reset.
    pub learn_on_one_cell: bool,
    pub seed: u64,
}

impl Default for TemporalMemoryParams {
    fn default() -> Self {
        Self {
            num_columns: 2048,
            cells_per_column: 32,
            activation_threshold: 13,
            min_threshold: 10,
            connected_permanence: 0.5,
            initial_permanence: 0.21,
            permanence_increment: 0.1,
            permanence_decrement: 0.1,
            predicted_segment_decrement: 0.0,
            max_new_synapse_count: 20,
            num_external_cells: 0,
            form_internal_connections: true,
            learn_on_one_cell: false,
            seed: 42,
        }
    }
}

impl TemporalMemoryParams {
    /// Checks that the parameters describe a usable temporal memory.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.num_columns > 0, "num_columns must be > 0");
        ensure!(self.cells_per_column > 0, "cells_per_column must be > 0");
        ensure!(
            self.activation_threshold > 0,
            "activation_threshold must be > 0"
        );
        ensure!(
            self.min_threshold <= self.activation_threshold,
            "min_threshold ({}) must not exceed activation_threshold ({})",
            self.min_threshold,
            self.activation_threshold
        );

        for (name, value) in [
            ("connected_permanence", self.connected_permanence),
            ("initial_permanence", self.initial_permanence),
            ("permanence_increment", self.permanence_increment),
            ("permanence_decrement", self.permanence_decrement),
            ("predicted_segment_decrement", self.predicted_segment_decrement),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{} must lie in [0, 1], got {}",
                name,
                value
            );
        }

        ensure!(
            self.connected_permanence > 0.0,
            "connected_permanence must be > 0"
        );

        Ok(())
    }
}

/// The full derived state of one time step. Recomputed from scratch on every step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimestepState {
    pub active_cells: CellSet,
    pub winner_cells: CellSet,
    pub active_segments: SegmentSet,
    pub predictive_cells: CellSet,
    pub predicted_columns: ColumnSet,
    pub chosen_cell_for_column: ChosenCells,
    pub matching_segments: SegmentSet,
    pub matching_cells: CellSet,
}

/// The sensory input of one time step.
#[derive(Clone, Copy, Debug)]
pub struct StepInput<'a> {
    /// Columns active at `t`.
    pub active_columns: &'a ColumnSet,

    /// External cells active at `t`, already reindexed past the internal cells.
    pub active_external_cells: &'a CellSet,

    /// External cells active at `t - 1`, already reindexed past the internal cells.
    pub prev_active_external_cells: &'a CellSet,
}

/// The phase operations a temporal memory variant may substitute.
pub trait Phases {
    /// Phase 2: bursts the active columns that were not predicted.
    fn burst_columns<C, R>(
        &self,
        burster: &ColumnBurster,
        input: BurstInput<'_>,
        chosen_cell_for_column: ChosenCells,
        connections: &mut C,
        rng: &mut R,
    ) -> Burst
    where
        C: Connectivity + ?Sized,
        R: Rng + ?Sized;

    /// Phase 4: computes the predictive and matching state for the next time step.
    fn compute_predictive_cells<C>(
        &self,
        propagator: &Propagator,
        active_cells: &CellSet,
        connections: &C,
    ) -> Predictions
    where
        C: Connectivity + ?Sized;

    /// Returns true if activity of `cell` from the previous step must be ignored.
    fn is_excluded(&self, _cell: CellIdx) -> bool {
        false
    }
}

/// The plain temporal memory phases: every cell is alive.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardPhases;

impl Phases for StandardPhases {
    fn burst_columns<C, R>(
        &self,
        burster: &ColumnBurster,
        input: BurstInput<'_>,
        chosen_cell_for_column: ChosenCells,
        connections: &mut C,
        rng: &mut R,
    ) -> Burst
    where
        C: Connectivity + ?Sized,
        R: Rng + ?Sized,
    {
        burster.burst_columns(input, chosen_cell_for_column, connections, &AllAlive, rng)
    }

    fn compute_predictive_cells<C>(
        &self,
        propagator: &Propagator,
        active_cells: &CellSet,
        connections: &C,
    ) -> Predictions
    where
        C: Connectivity + ?Sized,
    {
        propagator.compute_predictive_cells(active_cells, connections, &AllAlive)
    }
}

/// The temporal memory step engine. Holds configuration only, all state is passed in and out.
#[derive(Clone, Debug)]
pub struct TemporalMemory {
    params: TemporalMemoryParams,
    layout: ColumnLayout,
    propagator: Propagator,
    burster: ColumnBurster,
    learner: Learner,
}

impl TemporalMemory {
    /// Constructs a new Temporal Memory engine from validated parameters.
    pub fn new(params: TemporalMemoryParams) -> Result<Self> {
        params.validate()?;

        let layout = ColumnLayout::new(params.num_columns, params.cells_per_column);

        Ok(Self {
            layout,
            propagator: Propagator {
                connected_permanence: params.connected_permanence,
                activation_threshold: params.activation_threshold,
                min_threshold: params.min_threshold,
                num_external_cells: params.num_external_cells,
            },
            burster: ColumnBurster {
                layout,
                min_threshold: params.min_threshold,
            },
            learner: Learner {
                initial_permanence: params.initial_permanence,
                permanence_increment: params.permanence_increment,
                permanence_decrement: params.permanence_decrement,
                predicted_segment_decrement: params.predicted_segment_decrement,
                max_new_synapse_count: params.max_new_synapse_count,
            },
            params,
        })
    }

    #[inline]
    pub fn params(&self) -> &TemporalMemoryParams {
        &self.params
    }

    #[inline]
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    #[inline]
    pub fn number_of_cells(&self) -> usize {
        self.layout.number_of_cells()
    }

    /// Executes one time step and returns the new state.
    ///
    /// - Activates the cells predicted correctly at the previous step.
    /// - Bursts the remaining active columns through `phases`.
    /// - If `learn` is true, adapts the segments that took part in the transition.
    /// - Propagates the new activity (internal and external) through `phases` to compute the
    ///   predictive and matching state.
    ///
    /// Previous activity of cells `phases` excludes is dropped before it is used.
    /// Panics if an active column, a previous active or winner cell, or an external cell lies
    /// outside its index space.
    pub fn compute_fn<P, C, R>(
        &self,
        phases: &P,
        input: StepInput<'_>,
        prev: &TimestepState,
        connections: &mut C,
        learn: bool,
        rng: &mut R,
    ) -> TimestepState
    where
        P: Phases,
        C: Connectivity + ?Sized,
        R: Rng + ?Sized,
    {
        for &column in input.active_columns {
            assert!(
                column < self.layout.num_columns,
                "Active column {} is outside of [0, {})",
                column,
                self.layout.num_columns
            );
        }

        for (name, cells) in [
            ("Previous active cell", &prev.active_cells),
            ("Previous winner cell", &prev.winner_cells),
        ] {
            for &cell in cells {
                assert!(
                    self.layout.contains_cell(cell),
                    "{} {} is outside of [0, {})",
                    name,
                    cell,
                    self.layout.number_of_cells()
                );
            }
        }

        let num_internal = self.layout.number_of_cells();
        let num_presynaptic = num_internal + self.params.num_external_cells;
        for &cell in input
            .active_external_cells
            .iter()
            .chain(input.prev_active_external_cells)
        {
            assert!(
                (num_internal..num_presynaptic).contains(&cell),
                "External cell {} is outside of [{}, {})",
                cell,
                num_internal,
                num_presynaptic
            );
        }

        let live = |cells: &CellSet| -> CellSet {
            cells
                .iter()
                .copied()
                .filter(|&cell| !phases.is_excluded(cell))
                .collect()
        };

        let correct = activate_correctly_predictive_cells(
            &live(&prev.predictive_cells),
            &live(&prev.matching_cells),
            input.active_columns,
            &self.layout,
        );

        let prev_winner_cells = live(&prev.winner_cells);
        let mut prev_active_cells = live(&prev.active_cells);
        prev_active_cells.extend(input.prev_active_external_cells.iter().copied());

        let burst = phases.burst_columns(
            &self.burster,
            BurstInput {
                active_columns: input.active_columns,
                predicted_columns: &correct.predicted_columns,
                prev_active_cells: &prev_active_cells,
                prev_winner_cells: &prev_winner_cells,
                learn_on_one_cell: self.params.learn_on_one_cell,
            },
            prev.chosen_cell_for_column.clone(),
            connections,
            rng,
        );

        let mut active_cells = correct.active_cells;
        active_cells.extend(burst.active_cells.iter().copied());
        let mut winner_cells = correct.winner_cells;
        winner_cells.extend(burst.winner_cells.iter().copied());

        if learn {
            let mut prev_cell_activity = input.prev_active_external_cells.clone();
            if self.params.form_internal_connections {
                prev_cell_activity.extend(prev_winner_cells.iter().copied());
            }

            self.learner.learn_on_segments(
                LearningInput {
                    prev_active_segments: &prev.active_segments,
                    learning_segments: &burst.learning_segments,
                    prev_active_cells: &prev_active_cells,
                    winner_cells: &winner_cells,
                    prev_cell_activity: &prev_cell_activity,
                    orphan_cells: &correct.orphan_cells,
                    prev_matching_segments: &prev.matching_segments,
                },
                connections,
                rng,
            );
        }

        let mut propagating_cells = active_cells.clone();
        propagating_cells.extend(input.active_external_cells.iter().copied());

        let predictions =
            phases.compute_predictive_cells(&self.propagator, &propagating_cells, &*connections);

        debug!(
            "Step: {} active columns, {} predicted, {} active cells, {} winners, {} predictive",
            input.active_columns.len(),
            correct.predicted_columns.len(),
            active_cells.len(),
            winner_cells.len(),
            predictions.predictive_cells.len()
        );

        TimestepState {
            active_cells,
            winner_cells,
            active_segments: predictions.active_segments,
            predictive_cells: predictions.predictive_cells,
            predicted_columns: correct.predicted_columns,
            chosen_cell_for_column: burst.chosen_cell_for_column,
            matching_segments: predictions.matching_segments,
            matching_cells: predictions.matching_cells,
        }
    }
}
