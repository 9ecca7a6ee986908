//! `Connections` is the distal connectivity graph of the temporal memory.
//!
//! Each cell owns any number of dendritic segments. Each segment owns synapses, and every synapse
//! points back to one presynaptic cell and holds a permanence value in `[0, 1]`.
//! A synapse whose permanence reaches the connected threshold counts toward segment activation,
//! any synapse with a positive permanence counts toward segment matching.
//!
//! Like the synapse pool of the spatial pooler, all records live in flat vectors and are
//! addressed by plain indices: cells by `CellIdx`, segments by `Segment`, synapses by `Synapse`.
//! Forward propagation walks from an active cell to the synapses it feeds, so the pool keeps an
//! index from presynaptic cell to synapses. That index is keyed by a hash map, because external
//! cells (reindexed past the last internal cell) may be presynaptic too.
//!
//! The algorithm only talks to the graph through the `Connectivity` trait, so any other storage
//! can be plugged in.

use fxhash::{FxHashMap, FxHashSet};

/// Index of a cell. Internal cells lie in `[0, number_of_cells)`.
pub type CellIdx = usize;

/// Opaque identifier of a segment.
pub type Segment = usize;

/// Opaque identifier of a synapse.
pub type Synapse = usize;

/// Strength of a synapse.
pub type Permanence = f64;

/// A set of cell indices.
pub type CellSet = FxHashSet<CellIdx>;

/// A set of column indices.
pub type ColumnSet = FxHashSet<usize>;

/// A set of segment identifiers.
pub type SegmentSet = FxHashSet<Segment>;

/// Lowest permanence a synapse can hold.
pub const MIN_PERMANENCE: Permanence = 0.0;

/// Highest permanence a synapse can hold.
pub const MAX_PERMANENCE: Permanence = 1.0;

/// The data a synapse carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynapseData {
    /// The segment this synapse belongs to.
    pub segment: Segment,

    /// The cell on the sending side of the synapse.
    pub presynaptic_cell: CellIdx,

    /// The strength of the connection.
    pub permanence: Permanence,
}

/// Operations on the connectivity graph used by the temporal memory phases.
///
/// Referencing a segment or synapse the graph does not know is a broken invariant of the
/// caller, implementations are expected to panic on it.
pub trait Connectivity {
    /// The number of cells that may own segments.
    fn num_cells(&self) -> usize;

    /// All synapses whose presynaptic side is `cell`.
    fn synapses_for_presynaptic_cell(&self, cell: CellIdx) -> &[Synapse];

    /// The data of a live synapse.
    fn data_for_synapse(&self, synapse: Synapse) -> SynapseData;

    /// The cell that owns `segment`.
    fn cell_for_segment(&self, segment: Segment) -> CellIdx;

    /// The segments owned by `cell`, in creation order.
    fn segments_for_cell(&self, cell: CellIdx) -> &[Segment];

    /// The synapses on `segment`.
    fn synapses_for_segment(&self, segment: Segment) -> &[Synapse];

    /// Creates an empty segment on `cell` and returns it.
    fn create_segment(&mut self, cell: CellIdx) -> Segment;

    /// Creates a synapse from `presynaptic_cell` onto `segment`.
    fn create_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: CellIdx,
        permanence: Permanence,
    ) -> Synapse;

    /// Sets the permanence of a synapse.
    fn update_synapse_permanence(&mut self, synapse: Synapse, permanence: Permanence);

    /// Removes a synapse from the graph.
    fn destroy_synapse(&mut self, synapse: Synapse);

    /// The number of segments in the graph.
    fn num_segments(&self) -> usize;

    /// The number of live synapses in the graph.
    fn num_synapses(&self) -> usize;
}

/// Per-segment record.
#[derive(Clone, Debug)]
struct SegmentData {
    cell: CellIdx,
    synapses: Vec<Synapse>,
}

/// The default in-memory connectivity graph.
#[derive(Clone, Debug)]
pub struct Connections {
    /// Segments owned by each cell.
    cells: Vec<Vec<Segment>>,

    /// All segments, indexed by `Segment`.
    segments: Vec<SegmentData>,

    /// All synapse slots, indexed by `Synapse`. Destroyed slots are `None`.
    synapses: Vec<Option<SynapseData>>,

    /// Destroyed synapse slots available for reuse.
    free_synapses: Vec<Synapse>,

    /// Presynaptic cell -> synapses it feeds.
    synapses_for_presynaptic_cell: FxHashMap<CellIdx, Vec<Synapse>>,

    /// The number of live synapses.
    num_synapses: usize,
}

impl Connections {
    /// Creates an empty graph for `num_cells` cells.
    #[inline]
    pub fn new(num_cells: usize) -> Self {
        Self {
            cells: vec![Vec::new(); num_cells],
            segments: Vec::new(),
            synapses: Vec::new(),
            free_synapses: Vec::new(),
            synapses_for_presynaptic_cell: FxHashMap::default(),
            num_synapses: 0,
        }
    }

    fn segment(&self, segment: Segment) -> &SegmentData {
        match self.segments.get(segment) {
            Some(data) => data,
            None => panic!("Unknown segment {}", segment),
        }
    }

    fn segment_mut(&mut self, segment: Segment) -> &mut SegmentData {
        match self.segments.get_mut(segment) {
            Some(data) => data,
            None => panic!("Unknown segment {}", segment),
        }
    }

    fn synapse_mut(&mut self, synapse: Synapse) -> &mut SynapseData {
        match self.synapses.get_mut(synapse) {
            Some(Some(data)) => data,
            _ => panic!("Unknown or destroyed synapse {}", synapse),
        }
    }
}

/// Removes the first occurrence of `value` from `list` without preserving order.
fn swap_remove_value(list: &mut Vec<usize>, value: usize) {
    if let Some(pos) = list.iter().position(|&v| v == value) {
        list.swap_remove(pos);
    }
}

impl Connectivity for Connections {
    #[inline]
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn synapses_for_presynaptic_cell(&self, cell: CellIdx) -> &[Synapse] {
        self.synapses_for_presynaptic_cell
            .get(&cell)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[inline]
    fn data_for_synapse(&self, synapse: Synapse) -> SynapseData {
        match self.synapses.get(synapse) {
            Some(Some(data)) => *data,
            _ => panic!("Unknown or destroyed synapse {}", synapse),
        }
    }

    #[inline]
    fn cell_for_segment(&self, segment: Segment) -> CellIdx {
        self.segment(segment).cell
    }

    #[inline]
    fn segments_for_cell(&self, cell: CellIdx) -> &[Segment] {
        assert!(
            cell < self.cells.len(),
            "Cell {} is outside of [0, {})",
            cell,
            self.cells.len()
        );
        &self.cells[cell]
    }

    #[inline]
    fn synapses_for_segment(&self, segment: Segment) -> &[Synapse] {
        &self.segment(segment).synapses
    }

    fn create_segment(&mut self, cell: CellIdx) -> Segment {
        assert!(
            cell < self.cells.len(),
            "Cannot create a segment on cell {} outside of [0, {})",
            cell,
            self.cells.len()
        );
        let segment = self.segments.len();
        self.segments.push(SegmentData {
            cell,
            synapses: Vec::new(),
        });
        self.cells[cell].push(segment);
        segment
    }

    fn create_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: CellIdx,
        permanence: Permanence,
    ) -> Synapse {
        let existing = self
            .segment(segment)
            .synapses
            .iter()
            .copied()
            .find(|&s| self.data_for_synapse(s).presynaptic_cell == presynaptic_cell);

        if let Some(synapse) = existing {
            return synapse;
        }

        let data = SynapseData {
            segment,
            presynaptic_cell,
            permanence: permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE),
        };

        let synapse = match self.free_synapses.pop() {
            Some(slot) => {
                self.synapses[slot] = Some(data);
                slot
            }
            None => {
                self.synapses.push(Some(data));
                self.synapses.len() - 1
            }
        };

        self.segment_mut(segment).synapses.push(synapse);
        self.synapses_for_presynaptic_cell
            .entry(presynaptic_cell)
            .or_default()
            .push(synapse);
        self.num_synapses += 1;
        synapse
    }

    #[inline]
    fn update_synapse_permanence(&mut self, synapse: Synapse, permanence: Permanence) {
        self.synapse_mut(synapse).permanence = permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE);
    }

    fn destroy_synapse(&mut self, synapse: Synapse) {
        let data = self.data_for_synapse(synapse);

        swap_remove_value(&mut self.segment_mut(data.segment).synapses, synapse);

        if let Some(list) = self
            .synapses_for_presynaptic_cell
            .get_mut(&data.presynaptic_cell)
        {
            swap_remove_value(list, synapse);
            if list.is_empty() {
                self.synapses_for_presynaptic_cell
                    .remove(&data.presynaptic_cell);
            }
        }

        self.synapses[synapse] = None;
        self.free_synapses.push(synapse);
        self.num_synapses -= 1;
    }

    #[inline]
    fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    fn num_synapses(&self) -> usize {
        self.num_synapses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_belong_to_their_cell() {
        let mut connections = Connections::new(4);
        let a = connections.create_segment(2);
        let b = connections.create_segment(2);

        assert_eq!(connections.cell_for_segment(a), 2);
        assert_eq!(connections.segments_for_cell(2), &[a, b]);
        assert!(connections.segments_for_cell(0).is_empty());
        assert_eq!(connections.num_segments(), 2);
    }

    #[test]
    fn synapses_are_indexed_by_presynaptic_cell() {
        let mut connections = Connections::new(4);
        let segment = connections.create_segment(0);
        let s1 = connections.create_synapse(segment, 3, 0.4);
        let s2 = connections.create_synapse(segment, 1, 0.7);

        assert_eq!(connections.synapses_for_presynaptic_cell(3), &[s1]);
        assert_eq!(connections.synapses_for_presynaptic_cell(1), &[s2]);
        assert!(connections.synapses_for_presynaptic_cell(2).is_empty());
        assert_eq!(connections.data_for_synapse(s1).segment, segment);
        assert_eq!(connections.num_synapses(), 2);
    }

    #[test]
    fn duplicate_synapse_returns_existing() {
        let mut connections = Connections::new(2);
        let segment = connections.create_segment(0);
        let first = connections.create_synapse(segment, 1, 0.3);
        let second = connections.create_synapse(segment, 1, 0.9);

        assert_eq!(first, second);
        assert_eq!(connections.synapses_for_segment(segment).len(), 1);
        assert_eq!(connections.data_for_synapse(first).permanence, 0.3);
    }

    #[test]
    fn permanence_is_clamped() {
        let mut connections = Connections::new(2);
        let segment = connections.create_segment(0);
        let synapse = connections.create_synapse(segment, 1, 1.5);
        assert_eq!(connections.data_for_synapse(synapse).permanence, 1.0);

        connections.update_synapse_permanence(synapse, -0.2);
        assert_eq!(connections.data_for_synapse(synapse).permanence, 0.0);
    }

    #[test]
    fn destroyed_synapse_slot_is_reused() {
        let mut connections = Connections::new(3);
        let segment = connections.create_segment(0);
        let synapse = connections.create_synapse(segment, 1, 0.5);

        connections.destroy_synapse(synapse);
        assert!(connections.synapses_for_segment(segment).is_empty());
        assert!(connections.synapses_for_presynaptic_cell(1).is_empty());
        assert_eq!(connections.num_synapses(), 0);

        let reused = connections.create_synapse(segment, 2, 0.5);
        assert_eq!(reused, synapse);
        assert_eq!(connections.data_for_synapse(reused).presynaptic_cell, 2);
    }

    #[test]
    fn external_presynaptic_cells_are_allowed() {
        let mut connections = Connections::new(2);
        let segment = connections.create_segment(1);
        let synapse = connections.create_synapse(segment, 100, 0.5);

        assert_eq!(connections.synapses_for_presynaptic_cell(100), &[synapse]);
    }

    #[test]
    #[should_panic(expected = "Unknown segment")]
    fn unknown_segment_panics() {
        Connections::new(2).cell_for_segment(7);
    }

    #[test]
    #[should_panic(expected = "destroyed synapse")]
    fn destroyed_synapse_panics() {
        let mut connections = Connections::new(2);
        let segment = connections.create_segment(0);
        let synapse = connections.create_synapse(segment, 1, 0.5);
        connections.destroy_synapse(synapse);
        connections.data_for_synapse(synapse);
    }
}
