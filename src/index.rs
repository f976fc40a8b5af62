//! Index module: builder API for superstep index sets.
//!
//! Stands in for the `forall i where i in ... if ...` notation: an index set
//! is built from ranges or grids, narrowed with filters, and handed to
//! `forall`. Order is kept as built.

use crate::unit::Coord;
use std::ops::Range;

/// An ordered set of coordinates to run a superstep over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    coords: Vec<Coord>,
}

impl IndexSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-coordinate indices `range`.
    pub fn range(range: Range<usize>) -> Self {
        Self {
            coords: range.map(Coord::single).collect(),
        }
    }

    /// Every `(i, j)` with `i` in `rows` and `j` in `cols`, row-major.
    pub fn grid(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self {
            coords: rows
                .flat_map(|i| cols.clone().map(move |j| Coord::pair(i, j)))
                .collect(),
        }
    }

    /// Explicit `(i, j)` pairs in the given order.
    pub fn pairs(pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self {
            coords: pairs.into_iter().map(Coord::from).collect(),
        }
    }

    /// Keep the indices for which `pred` holds.
    pub fn filter(mut self, pred: impl Fn(Coord) -> bool) -> Self {
        self.coords.retain(|c| pred(*c));
        self
    }

    /// Keep every `step`-th index, starting with the first.
    pub fn step_by(self, step: usize) -> Self {
        Self {
            coords: self.coords.into_iter().step_by(step.max(1)).collect(),
        }
    }

    /// Append another set after this one.
    pub fn chain(mut self, other: IndexSet) -> Self {
        self.coords.extend(other.coords);
        self
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// True when the set has no indices.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// The indices in order.
    pub fn into_vec(self) -> Vec<Coord> {
        self.coords
    }
}

impl IntoIterator for IndexSet {
    type Item = Coord;
    type IntoIter = std::vec::IntoIter<Coord>;

    fn into_iter(self) -> Self::IntoIter {
        self.coords.into_iter()
    }
}

impl FromIterator<Coord> for IndexSet {
    fn from_iter<T: IntoIterator<Item = Coord>>(iter: T) -> Self {
        Self {
            coords: iter.into_iter().collect(),
        }
    }
}
