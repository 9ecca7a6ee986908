//! A fallible temporal memory.
//!
//! `FaultyTemporalMemory` allows killing a percentage of its cells. Dead cells cannot become active,
//! no longer take part in predictions, and cannot become winner cells. The surviving network keeps
//! learning and predicting, which makes it possible to measure how robust the learned sequences are.
//!
//! The fault behavior is a pair of substituted phases (`FaultyPhases`) plugged into the plain
//! `TemporalMemory` engine:
//! - bursting skips dead cells when activating a column and when choosing its winner,
//! - forward propagation ignores synapses onto dead cells.
//!
//! Previous activity of cells that died since the last step is dropped as well, so a cell killed
//! between two steps can never resurface.

use super::{
    bursting::{Burst, BurstInput, ChosenCells, ColumnBurster},
    connections::{CellIdx, CellSet, ColumnSet, Connectivity, Connections},
    fault_mask::{CellHealth, FaultMask},
    propagation::{Predictions, Propagator},
    temporal_memory::{Phases, StepInput, TemporalMemory, TemporalMemoryParams, TimestepState},
};
use anyhow::Result;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Temporal memory phases that honor a fault mask.
#[derive(Clone, Copy, Debug)]
pub struct FaultyPhases<'a> {
    pub mask: &'a FaultMask,
}

impl Phases for FaultyPhases<'_> {
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
        burster.burst_columns(input, chosen_cell_for_column, connections, self.mask, rng)
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
        propagator.compute_predictive_cells(active_cells, connections, self.mask)
    }

    fn is_excluded(&self, cell: CellIdx) -> bool {
        self.mask.is_dead(cell)
    }
}

/// A temporal memory with its own connectivity graph, fault mask and state.
#[derive(Debug)]
pub struct FaultyTemporalMemory {
    engine: TemporalMemory,
    connections: Connections,
    fault_mask: FaultMask,

    // State of the previous time step.
    state: TimestepState,
    prev_active_external_cells: CellSet,

    // Current time step.
    t: u64,

    rand: StdRng,
}

impl FaultyTemporalMemory {
    /// Constructs a new fallible Temporal Memory. No cell is dead initially.
    pub fn new(params: TemporalMemoryParams) -> Result<Self> {
        let rand = StdRng::seed_from_u64(params.seed);
        let engine = TemporalMemory::new(params)?;
        let connections = Connections::new(engine.number_of_cells());

        debug!(
            "Faulty temporal memory with {} columns x {} cells",
            engine.layout().num_columns,
            engine.layout().cells_per_column
        );

        Ok(Self {
            engine,
            connections,
            fault_mask: FaultMask::new(),
            state: TimestepState::default(),
            prev_active_external_cells: CellSet::default(),
            t: 0,
            rand,
        })
    }

    /// Executes one time step without external context.
    pub fn compute(&mut self, active_columns: &[usize], learn: bool) {
        self.compute_with_external(active_columns, &[], learn);
    }

    /// Executes one time step.
    ///
    /// `active_external_cells` are indices in `[0, num_external_cells)`.
    /// Panics if a column or external cell index is out of range.
    pub fn compute_with_external(
        &mut self,
        active_columns: &[usize],
        active_external_cells: &[usize],
        learn: bool,
    ) {
        let active_columns: ColumnSet = active_columns.iter().copied().collect();
        let active_external_cells = self.reindex_external_cells(active_external_cells);

        self.state = self.engine.compute_fn(
            &FaultyPhases {
                mask: &self.fault_mask,
            },
            StepInput {
                active_columns: &active_columns,
                active_external_cells: &active_external_cells,
                prev_active_external_cells: &self.prev_active_external_cells,
            },
            &self.state,
            &mut self.connections,
            learn,
            &mut self.rand,
        );

        self.prev_active_external_cells = active_external_cells;
        self.t += 1;
    }

    /// Maps external cell indices past the internal cells.
    fn reindex_external_cells(&self, cells: &[usize]) -> CellSet {
        let num_external = self.engine.params().num_external_cells;
        let offset = self.engine.number_of_cells();

        cells
            .iter()
            .map(|&cell| {
                assert!(
                    cell < num_external,
                    "External cell {} is outside of [0, {})",
                    cell,
                    num_external
                );
                offset + cell
            })
            .collect()
    }

    /// Forgets all sequence state, including the winner cells chosen per column.
    /// Learned connections and the fault mask are kept.
    pub fn reset(&mut self) {
        self.state = TimestepState::default();
        self.prev_active_external_cells.clear();
    }

    /// Kills `round(percent * number_of_cells)` random cells, replacing the previous dead set.
    pub fn kill_cells(&mut self, percent: f64) -> usize {
        let num_cells = self.number_of_cells();
        self.fault_mask.kill_cells(percent, num_cells, &mut self.rand)
    }

    /// Like `kill_cells`, drawing the victims from `rng`.
    pub fn kill_cells_with<R: Rng + ?Sized>(&mut self, percent: f64, rng: &mut R) -> usize {
        let num_cells = self.number_of_cells();
        self.fault_mask.kill_cells(percent, num_cells, rng)
    }

    /// Replaces the fault mask.
    pub fn set_fault_mask(&mut self, mask: FaultMask) {
        assert!(
            mask.dead_cells()
                .iter()
                .all(|&cell| cell < self.number_of_cells()),
            "Fault mask references cells outside of [0, {})",
            self.number_of_cells()
        );
        self.fault_mask = mask;
    }

    #[inline]
    pub fn number_of_cells(&self) -> usize {
        self.engine.number_of_cells()
    }

    #[inline]
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    #[inline]
    pub fn fault_mask(&self) -> &FaultMask {
        &self.fault_mask
    }

    /// The state computed by the last time step.
    #[inline]
    pub fn state(&self) -> &TimestepState {
        &self.state
    }

    /// The number of time steps computed so far.
    #[inline]
    pub fn iteration(&self) -> u64 {
        self.t
    }

    /// Returns the dead cells in ascending order.
    pub fn dead_cells(&self) -> Vec<CellIdx> {
        sorted(self.fault_mask.dead_cells())
    }

    /// Returns the active cells in ascending order.
    pub fn active_cells(&self) -> Vec<CellIdx> {
        sorted(&self.state.active_cells)
    }

    /// Returns the winner cells in ascending order.
    pub fn winner_cells(&self) -> Vec<CellIdx> {
        sorted(&self.state.winner_cells)
    }

    /// Returns the cells predicted for the next time step in ascending order.
    pub fn predictive_cells(&self) -> Vec<CellIdx> {
        sorted(&self.state.predictive_cells)
    }

    /// Returns the matching cells in ascending order.
    pub fn matching_cells(&self) -> Vec<CellIdx> {
        sorted(&self.state.matching_cells)
    }

    /// Returns the active columns that had a correctly predicted cell, in ascending order.
    pub fn predicted_columns(&self) -> Vec<usize> {
        sorted(&self.state.predicted_columns)
    }

    /// Returns the columns of the predictive cells in ascending order.
    pub fn predictive_columns(&self) -> Vec<usize> {
        let layout = self.engine.layout();
        let mut columns: Vec<usize> = self
            .state
            .predictive_cells
            .iter()
            .map(|&cell| layout.column_for_cell(cell))
            .collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }
}

fn sorted(set: &CellSet) -> Vec<usize> {
    let mut cells: Vec<usize> = set.iter().copied().collect();
    cells.sort_unstable();
    cells
}
