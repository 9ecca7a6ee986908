//! Selection of the cell that learns when a column bursts.
//!
//! The best matching cell is the candidate owning the segment with the most active synapses,
//! as long as that segment reaches `min_threshold`. When no candidate has such a segment, the
//! least used candidate (the one with the fewest segments) is picked, ties broken at random.

use super::connections::{CellIdx, CellSet, Connectivity, Segment, Synapse};
use rand::Rng;

/// The cell chosen to learn in a bursting column and, if it has one, its best matching segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BestMatch {
    pub cell: CellIdx,
    pub segment: Option<Segment>,
}

/// Returns the synapses on `segment` with a positive permanence whose presynaptic cell is active.
pub fn active_synapses_for_segment<C: Connectivity + ?Sized>(
    segment: Segment,
    active_cells: &CellSet,
    connections: &C,
) -> Vec<Synapse> {
    connections
        .synapses_for_segment(segment)
        .iter()
        .copied()
        .filter(|&synapse| {
            let data = connections.data_for_synapse(synapse);
            data.permanence > 0.0 && active_cells.contains(&data.presynaptic_cell)
        })
        .collect()
}

/// Returns the segment of `cell` with the most active synapses and that count, if the count
/// reaches `min_threshold`. Among equally good segments the oldest one wins.
pub fn best_matching_segment<C: Connectivity + ?Sized>(
    cell: CellIdx,
    active_cells: &CellSet,
    connections: &C,
    min_threshold: usize,
) -> Option<(Segment, usize)> {
    let mut best: Option<(Segment, usize)> = None;

    for &segment in connections.segments_for_cell(cell) {
        let num_active = active_synapses_for_segment(segment, active_cells, connections).len();

        if num_active >= min_threshold && best.map_or(true, |(_, max)| num_active > max) {
            best = Some((segment, num_active));
        }
    }

    best
}

/// Returns the candidate with the fewest segments. Ties are broken uniformly at random.
pub fn least_used_cell<C, R>(cells: &[CellIdx], connections: &C, rng: &mut R) -> Option<CellIdx>
where
    C: Connectivity + ?Sized,
    R: Rng + ?Sized,
{
    let mut min_segments = usize::MAX;
    let mut min_cells = Vec::new();

    for &cell in cells {
        let seg_count = connections.segments_for_cell(cell).len();
        if seg_count < min_segments {
            min_segments = seg_count;
            min_cells.clear();
            min_cells.push(cell);
        } else if seg_count == min_segments {
            min_cells.push(cell);
        }
    }

    match min_cells.len() {
        0 => None,
        1 => Some(min_cells[0]),
        n => Some(min_cells[rng.random_range(0..n)]),
    }
}

/// Picks the winner among `cells` (expected in ascending order).
///
/// Returns `None` only if `cells` is empty.
pub fn best_matching_cell<C, R>(
    cells: &[CellIdx],
    active_cells: &CellSet,
    connections: &C,
    min_threshold: usize,
    rng: &mut R,
) -> Option<BestMatch>
where
    C: Connectivity + ?Sized,
    R: Rng + ?Sized,
{
    let mut best: Option<(CellIdx, Segment, usize)> = None;

    for &cell in cells {
        if let Some((segment, num_active)) =
            best_matching_segment(cell, active_cells, connections, min_threshold)
        {
            if best.map_or(true, |(_, _, max)| num_active > max) {
                best = Some((cell, segment, num_active));
            }
        }
    }

    match best {
        Some((cell, segment, _)) => Some(BestMatch {
            cell,
            segment: Some(segment),
        }),
        None => least_used_cell(cells, connections, rng).map(|cell| BestMatch {
            cell,
            segment: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connections::Connections;
    use rand::{rngs::StdRng, SeedableRng};

    fn cells(list: &[usize]) -> CellSet {
        list.iter().copied().collect()
    }

    #[test]
    fn counts_only_active_positive_synapses() {
        let mut connections = Connections::new(8);
        let segment = connections.create_segment(4);
        let s1 = connections.create_synapse(segment, 0, 0.3);
        connections.create_synapse(segment, 1, 0.0);
        connections.create_synapse(segment, 2, 0.3);

        let active = active_synapses_for_segment(segment, &cells(&[0, 1]), &connections);
        assert_eq!(active, vec![s1]);
    }

    #[test]
    fn best_segment_respects_threshold() {
        let mut connections = Connections::new(8);
        let weak = connections.create_segment(4);
        connections.create_synapse(weak, 0, 0.3);
        let strong = connections.create_segment(4);
        connections.create_synapse(strong, 0, 0.3);
        connections.create_synapse(strong, 1, 0.3);

        let active = cells(&[0, 1]);
        assert_eq!(
            best_matching_segment(4, &active, &connections, 1),
            Some((strong, 2))
        );
        assert_eq!(best_matching_segment(4, &active, &connections, 3), None);
    }

    #[test]
    fn picks_cell_with_best_segment() {
        let mut connections = Connections::new(8);
        let a = connections.create_segment(4);
        connections.create_synapse(a, 0, 0.3);
        let b = connections.create_segment(5);
        connections.create_synapse(b, 0, 0.3);
        connections.create_synapse(b, 1, 0.3);

        let mut rng = StdRng::seed_from_u64(0);
        let best = best_matching_cell(&[4, 5, 6, 7], &cells(&[0, 1]), &connections, 1, &mut rng);

        assert_eq!(
            best,
            Some(BestMatch {
                cell: 5,
                segment: Some(b)
            })
        );
    }

    #[test]
    fn falls_back_to_least_used_cell() {
        let mut connections = Connections::new(4);
        connections.create_segment(0);
        connections.create_segment(1);
        connections.create_segment(1);

        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let best = best_matching_cell(&[0, 1, 2, 3], &CellSet::default(), &connections, 1, &mut rng)
                .map(|m| m.cell);
            assert!(matches!(best, Some(2) | Some(3)));
        }
    }

    #[test]
    fn empty_candidates_have_no_winner() {
        let connections = Connections::new(4);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            best_matching_cell(&[], &CellSet::default(), &connections, 1, &mut rng),
            None
        );
    }
}
