//! Hebbian learning on distal segments.
//!
//! Segments that took part in the current transition are adapted:
//! - segments that were active at `t - 1` and belong to a winner cell,
//! - learning segments chosen or grown while bursting.
//!
//! Adapting a segment raises the permanence of its synapses from cells active at `t - 1` and lowers
//! the others. Synapses that fall to (almost) zero are removed from the graph.
//! Learning segments additionally grow synapses to previously active cells they are not yet
//! connected to, until they hold `max_new_synapse_count` active synapses.
//!
//! Segments that matched at `t - 1` on cells whose column stayed inactive (orphan cells) are
//! punished by `predicted_segment_decrement`.

use super::{
    connections::{CellIdx, CellSet, Connectivity, Permanence, Segment, SegmentSet, Synapse},
    matching::active_synapses_for_segment,
};
use fxhash::FxHashSet;
use rand::{seq::IndexedRandom, Rng};

/// Synapses below this permanence are destroyed.
const EPSILON: Permanence = 0.00001;

/// The state learning reads.
#[derive(Clone, Copy, Debug)]
pub struct LearningInput<'a> {
    /// Segments active at `t - 1`.
    pub prev_active_segments: &'a SegmentSet,

    /// Segments chosen or grown by bursting at `t`.
    pub learning_segments: &'a SegmentSet,

    /// Live internal and external cells active at `t - 1`.
    pub prev_active_cells: &'a CellSet,

    /// Winner cells at `t`.
    pub winner_cells: &'a CellSet,

    /// Cells new synapses may connect to.
    pub prev_cell_activity: &'a CellSet,

    /// Cells matching at `t - 1` whose column is not active at `t`.
    pub orphan_cells: &'a CellSet,

    /// Segments matching at `t - 1`.
    pub prev_matching_segments: &'a SegmentSet,
}

/// Learning rates of the segment adaptation.
#[derive(Clone, Copy, Debug)]
pub struct Learner {
    pub initial_permanence: Permanence,
    pub permanence_increment: Permanence,
    pub permanence_decrement: Permanence,
    pub predicted_segment_decrement: Permanence,
    pub max_new_synapse_count: usize,
}

impl Learner {
    /// Adapts the segments involved in the current transition and punishes orphan segments.
    pub fn learn_on_segments<C, R>(&self, input: LearningInput<'_>, connections: &mut C, rng: &mut R)
    where
        C: Connectivity + ?Sized,
        R: Rng + ?Sized,
    {
        let mut segments: Vec<Segment> = input
            .prev_active_segments
            .union(input.learning_segments)
            .copied()
            .collect();
        segments.sort_unstable();

        for segment in segments {
            let is_learning_segment = input.learning_segments.contains(&segment);
            let is_from_winner_cell = input
                .winner_cells
                .contains(&connections.cell_for_segment(segment));

            let active_synapses =
                active_synapses_for_segment(segment, input.prev_active_cells, &*connections);

            if is_learning_segment || is_from_winner_cell {
                adapt_segment(
                    segment,
                    &active_synapses,
                    connections,
                    self.permanence_increment,
                    self.permanence_decrement,
                );
            }

            if is_learning_segment {
                let n = self
                    .max_new_synapse_count
                    .saturating_sub(active_synapses.len());

                for presynaptic_cell in
                    pick_cells_to_learn_on(n, segment, input.prev_cell_activity, &*connections, rng)
                {
                    connections.create_synapse(segment, presynaptic_cell, self.initial_permanence);
                }
            }
        }

        if self.predicted_segment_decrement > 0.0 {
            let mut punished: Vec<Segment> = input
                .prev_matching_segments
                .iter()
                .copied()
                .filter(|&segment| {
                    input
                        .orphan_cells
                        .contains(&connections.cell_for_segment(segment))
                })
                .collect();
            punished.sort_unstable();

            for segment in punished {
                let active_synapses =
                    active_synapses_for_segment(segment, input.prev_active_cells, &*connections);
                adapt_segment(
                    segment,
                    &active_synapses,
                    connections,
                    -self.predicted_segment_decrement,
                    0.0,
                );
            }
        }
    }
}

/// Moves the permanence of active synapses by `increment` and of all other synapses on the segment
/// by `-decrement`. Synapses that drop below `EPSILON` are destroyed.
pub fn adapt_segment<C: Connectivity + ?Sized>(
    segment: Segment,
    active_synapses: &[Synapse],
    connections: &mut C,
    increment: Permanence,
    decrement: Permanence,
) {
    let active: FxHashSet<Synapse> = active_synapses.iter().copied().collect();
    let synapses = connections.synapses_for_segment(segment).to_vec();

    for synapse in synapses {
        let mut permanence = connections.data_for_synapse(synapse).permanence;

        if active.contains(&synapse) {
            permanence += increment;
        } else {
            permanence -= decrement;
        }

        permanence = permanence.clamp(0.0, 1.0);

        if permanence < EPSILON {
            connections.destroy_synapse(synapse);
        } else {
            connections.update_synapse_permanence(synapse, permanence);
        }
    }
}

/// Samples up to `n` cells from `candidates` that are not yet presynaptic on `segment`.
pub fn pick_cells_to_learn_on<C, R>(
    n: usize,
    segment: Segment,
    candidates: &CellSet,
    connections: &C,
    rng: &mut R,
) -> Vec<CellIdx>
where
    C: Connectivity + ?Sized,
    R: Rng + ?Sized,
{
    let existing: CellSet = connections
        .synapses_for_segment(segment)
        .iter()
        .map(|&synapse| connections.data_for_synapse(synapse).presynaptic_cell)
        .collect();

    let mut pool: Vec<CellIdx> = candidates
        .iter()
        .copied()
        .filter(|cell| !existing.contains(cell))
        .collect();
    pool.sort_unstable();

    let n = n.min(pool.len());
    pool.choose_multiple(rng, n).copied().collect()
}
