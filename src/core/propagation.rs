//! Forward propagation turns the cells active at time `t` into the predictive and matching state
//! for time `t + 1`.
//!
//! Every active cell feeds a set of synapses. Each synapse belongs to a segment, and each segment
//! belongs to a cell. Walking from the active cells along their synapses, two counts are kept per
//! segment:
//! - the number of synapses with a positive permanence (potential activity),
//! - the number of those whose permanence reaches `connected_permanence` (connected activity).
//!
//! A segment becomes matching as soon as its potential count reaches `min_threshold` and active as
//! soon as its connected count reaches `activation_threshold`. The owner of an active segment is
//! predictive, the owner of a matching segment is matching.
//!
//! Synapses onto a dead cell are skipped, so a dead cell can never become matching or predictive,
//! however much support its segments receive.

use super::{
    connections::{CellSet, Connectivity, Permanence, Segment, SegmentSet},
    fault_mask::CellHealth,
};
use fxhash::FxHashMap;

/// Per-segment activity counter. Segments that were never counted read as zero.
#[derive(Debug, Default)]
pub struct SegmentCounter {
    counts: FxHashMap<Segment, usize>,
}

impl SegmentCounter {
    /// Adds one to the count of `segment` and returns the new count.
    #[inline]
    pub fn increment(&mut self, segment: Segment) -> usize {
        let count = self.counts.entry(segment).or_insert(0);
        *count += 1;
        *count
    }

    /// The count of `segment`.
    #[inline]
    pub fn get(&self, segment: Segment) -> usize {
        self.counts.get(&segment).copied().unwrap_or(0)
    }
}

/// The predictive and matching state computed for the next time step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Predictions {
    pub active_segments: SegmentSet,
    pub predictive_cells: CellSet,
    pub matching_segments: SegmentSet,
    pub matching_cells: CellSet,
}

/// Thresholds of the forward propagation.
#[derive(Clone, Copy, Debug)]
pub struct Propagator {
    /// Permanence at which a synapse is connected.
    pub connected_permanence: Permanence,

    /// Connected active synapses a segment needs to become active.
    pub activation_threshold: usize,

    /// Potential active synapses a segment needs to become matching.
    pub min_threshold: usize,

    /// External cells indexed after the cells of the graph. They may be active but own no segments.
    pub num_external_cells: usize,
}

impl Propagator {
    /// Computes active and matching segments, and predictive and matching cells, from the cells
    /// active at the current time step.
    ///
    /// `active_cells` must not contain dead cells. Synapses whose permanence is not positive
    /// or whose segment belongs to a dead cell are ignored.
    /// Panics if an active cell is neither a cell of `connections` nor an external cell.
    pub fn compute_predictive_cells<C, H>(
        &self,
        active_cells: &CellSet,
        connections: &C,
        health: &H,
    ) -> Predictions
    where
        C: Connectivity + ?Sized,
        H: CellHealth + ?Sized,
    {
        let mut num_active_connected = SegmentCounter::default();
        let mut num_active_potential = SegmentCounter::default();
        let mut predictions = Predictions::default();
        let num_presynaptic_cells = connections.num_cells() + self.num_external_cells;

        for &cell in active_cells {
            assert!(
                cell < num_presynaptic_cells,
                "Active cell {} is outside of [0, {})",
                cell,
                num_presynaptic_cells
            );

            for &synapse in connections.synapses_for_presynaptic_cell(cell) {
                let data = connections.data_for_synapse(synapse);
                let segment = data.segment;
                let postsynaptic_cell = connections.cell_for_segment(segment);

                if data.permanence <= 0.0 || health.is_dead(postsynaptic_cell) {
                    continue;
                }

                if num_active_potential.increment(segment) >= self.min_threshold {
                    predictions.matching_segments.insert(segment);
                    predictions.matching_cells.insert(postsynaptic_cell);
                }

                if data.permanence >= self.connected_permanence
                    && num_active_connected.increment(segment) >= self.activation_threshold
                {
                    predictions.active_segments.insert(segment);
                    predictions.predictive_cells.insert(postsynaptic_cell);
                }
            }
        }

        predictions
    }
}
