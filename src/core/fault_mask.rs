//! The `FaultMask` marks a subset of cells as dead.
//!
//! Dead cells cannot become active, cannot win, and never enter the predictive or matching state.
//! The rest of the network keeps learning and predicting, which makes it possible to measure how
//! robust a learned sequence representation is to permanent cell loss.
//!
//! Lifecycle:
//! - A new mask is empty.
//! - Every call to `kill_cells` replaces the dead set wholesale. Cells killed by an earlier call
//!   come back to life unless they are drawn again.
//! - The mask never heals on its own.
//!
//! The mask is a plain value. The temporal memory only reads it, and the source of randomness
//! used to pick the victims is passed in by the caller.

use super::connections::{CellIdx, CellSet};
use log::debug;
use rand::{seq::SliceRandom, Rng};

/// Answers whether a cell is excluded from all activity.
pub trait CellHealth {
    /// Returns true if `cell` is dead.
    fn is_dead(&self, cell: CellIdx) -> bool;
}

/// Health of a network without faults: every cell is alive.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllAlive;

impl CellHealth for AllAlive {
    #[inline]
    fn is_dead(&self, _cell: CellIdx) -> bool {
        false
    }
}

/// The set of dead cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaultMask {
    dead: CellSet,
}

impl FaultMask {
    /// Creates a mask in which every cell is alive.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mask with exactly the given dead cells.
    pub fn from_cells<I: IntoIterator<Item = CellIdx>>(cells: I) -> Self {
        Self {
            dead: cells.into_iter().collect(),
        }
    }

    /// Creates a mask with `round(percent * num_cells)` randomly chosen dead cells.
    pub fn killed<R: Rng + ?Sized>(percent: f64, num_cells: usize, rng: &mut R) -> Self {
        let mut mask = Self::new();
        mask.kill_cells(percent, num_cells, rng);
        mask
    }

    /// Replaces the dead set with `round(percent * num_cells)` cells drawn uniformly at random.
    ///
    /// - `percent <= 0` (or NaN) resurrects every cell.
    /// - `percent >= 1` kills every cell.
    ///
    /// Returns the number of dead cells.
    pub fn kill_cells<R: Rng + ?Sized>(
        &mut self,
        percent: f64,
        num_cells: usize,
        rng: &mut R,
    ) -> usize {
        let cells_to_kill = (percent * num_cells as f64).round();

        if cells_to_kill > 0.0 {
            let count = (cells_to_kill as usize).min(num_cells);
            let mut cells: Vec<CellIdx> = (0..num_cells).collect();
            cells.shuffle(rng);
            cells.truncate(count);
            self.dead = cells.into_iter().collect();
        } else {
            self.clear();
        }

        debug!(
            "Fault mask replaced: {} of {} cells dead ({:.3} requested)",
            self.dead.len(),
            num_cells,
            percent
        );

        self.dead.len()
    }

    /// Resurrects every cell.
    #[inline]
    pub fn clear(&mut self) {
        self.dead.clear();
    }

    /// The number of dead cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.dead.len()
    }

    /// Returns true if no cell is dead.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dead.is_empty()
    }

    /// The dead cells.
    #[inline]
    pub fn dead_cells(&self) -> &CellSet {
        &self.dead
    }
}

impl CellHealth for FaultMask {
    #[inline]
    fn is_dead(&self, cell: CellIdx) -> bool {
        self.dead.contains(&cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn new_mask_is_empty() {
        let mask = FaultMask::new();
        assert!(mask.is_empty());
        assert!(!mask.is_dead(0));
    }

    #[test]
    fn kills_rounded_fraction_of_cells() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut mask = FaultMask::new();

        for &(percent, expected) in &[(0.0, 0), (0.05, 5), (0.104, 10), (0.125, 13), (0.5, 50), (1.0, 100)] {
            assert_eq!(mask.kill_cells(percent, 100, &mut rng), expected);
            assert_eq!(mask.len(), expected);
            assert!(mask.dead_cells().iter().all(|&cell| cell < 100));
        }
    }

    #[test]
    fn out_of_range_percent_is_clamped() {
        let mut rng = StdRng::seed_from_u64(1);

        assert!(FaultMask::killed(-0.3, 20, &mut rng).is_empty());
        assert!(FaultMask::killed(f64::NAN, 20, &mut rng).is_empty());

        let all = FaultMask::killed(3.0, 20, &mut rng);
        assert_eq!(all.len(), 20);
        assert!((0..20).all(|cell| all.is_dead(cell)));
    }

    #[test]
    fn kill_replaces_previous_dead_set() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mask = FaultMask::new();

        mask.kill_cells(1.0, 10, &mut rng);
        assert_eq!(mask.len(), 10);

        mask.kill_cells(0.2, 10, &mut rng);
        assert_eq!(mask.len(), 2);

        mask.kill_cells(0.0, 10, &mut rng);
        assert!(mask.is_empty());
    }

    #[test]
    fn same_seed_gives_same_faults() {
        let a = FaultMask::killed(0.3, 50, &mut StdRng::seed_from_u64(11));
        let b = FaultMask::killed(0.3, 50, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_dead_cells() {
        let mask = FaultMask::from_cells([1, 4]);
        assert!(mask.is_dead(1));
        assert!(mask.is_dead(4));
        assert!(!mask.is_dead(2));
        assert_eq!(mask.len(), 2);
    }

    #[test]
    fn clear_resurrects_every_cell() {
        let mut mask = FaultMask::killed(1.0, 2, &mut StdRng::seed_from_u64(0));
        assert!(mask.is_dead(0) && mask.is_dead(1));

        mask.clear();
        assert!(mask.is_empty());
    }
}
