//! Unit module: addressable processing cells with committed and staged state.

use crate::error::{BspError, Result};
use crate::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One or two integer coordinates identifying a unit (or a PRAM process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// First coordinate (row, level, or linear index).
    pub i: usize,
    /// Optional second coordinate (column).
    pub j: Option<usize>,
}

impl Coord {
    /// A single-coordinate address.
    pub const fn single(i: usize) -> Self {
        Self { i, j: None }
    }

    /// A two-coordinate address.
    pub const fn pair(i: usize, j: usize) -> Self {
        Self { i, j: Some(j) }
    }
}

impl From<usize> for Coord {
    fn from(i: usize) -> Self {
        Coord::single(i)
    }
}

impl From<(usize, usize)> for Coord {
    fn from((i, j): (usize, usize)) -> Self {
        Coord::pair(i, j)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.j {
            Some(j) => write!(f, "[{},{}]", self.i, j),
            None => write!(f, "[{}]", self.i),
        }
    }
}

/// Position of a unit inside its topology's unit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

/// A processing unit: named variables plus fixed adjacency.
///
/// Staged values are layered by the depth of the superstep that wrote them,
/// so an inner superstep commits its own layer and leaves the enclosing
/// step's writes staged.
#[derive(Debug, Clone)]
pub struct Unit {
    coord: Coord,
    committed: BTreeMap<String, Value>,
    staged: BTreeMap<String, BTreeMap<usize, Value>>,
    neighbors: Vec<UnitId>,
}

impl Unit {
    /// Create a unit whose adjacency is fixed for its whole life.
    pub(crate) fn new(coord: Coord, neighbors: Vec<UnitId>) -> Self {
        Self {
            coord,
            committed: BTreeMap::new(),
            staged: BTreeMap::new(),
            neighbors,
        }
    }

    /// The unit's coordinates.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Units linked to this one.
    pub fn neighbors(&self) -> &[UnitId] {
        &self.neighbors
    }

    /// Committed variables, authoritative between supersteps.
    pub fn committed(&self) -> &BTreeMap<String, Value> {
        &self.committed
    }

    /// Number of staged entries at exactly `depth`.
    pub fn staged_at(&self, depth: usize) -> usize {
        self.staged
            .values()
            .filter(|layers| layers.contains_key(&depth))
            .count()
    }

    /// Read `name`. A fresh read sees this unit's own staged write from the
    /// active superstep; otherwise the committed value is returned.
    pub fn read(&self, name: &str, fresh: bool) -> Result<Value> {
        if fresh {
            if let Some(value) = self
                .staged
                .get(name)
                .and_then(|layers| layers.values().next_back())
            {
                return Ok(*value);
            }
        }
        self.committed
            .get(name)
            .copied()
            .ok_or_else(|| BspError::UnsetVariable {
                unit: self.coord,
                name: name.to_string(),
            })
    }

    /// Write `name`. Depth 0 means no superstep is active and the value is
    /// committed immediately.
    pub(crate) fn write(&mut self, name: &str, value: Value, depth: usize) {
        if depth == 0 {
            self.committed.insert(name.to_string(), value);
        } else {
            self.staged
                .entry(name.to_string())
                .or_default()
                .insert(depth, value);
        }
    }

    pub(crate) fn begin_step(&mut self, depth: usize) {
        self.abort_step(depth);
    }

    /// Merge the layers staged at `depth` (or deeper) into the committed map.
    pub(crate) fn commit_step(&mut self, depth: usize) -> usize {
        let mut merged = 0;
        for (name, layers) in self.staged.iter_mut() {
            let ready = layers.split_off(&depth);
            if let Some(value) = ready.values().next_back() {
                self.committed.insert(name.clone(), *value);
                merged += 1;
            }
        }
        self.staged.retain(|_, layers| !layers.is_empty());
        merged
    }

    pub(crate) fn abort_step(&mut self, depth: usize) {
        for layers in self.staged.values_mut() {
            layers.retain(|d, _| *d < depth);
        }
        self.staged.retain(|_, layers| !layers.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_read_fails() {
        let unit = Unit::new(Coord::single(3), vec![]);
        assert_eq!(
            unit.read("a", false),
            Err(BspError::UnsetVariable {
                unit: Coord::single(3),
                name: "a".into()
            })
        );
    }

    #[test]
    fn fresh_read_sees_staged_committed_read_does_not() {
        let mut unit = Unit::new(Coord::single(0), vec![]);
        unit.write("a", 1, 0);
        unit.write("a", 2, 1);
        assert_eq!(unit.read("a", false), Ok(1));
        assert_eq!(unit.read("a", true), Ok(2));
        assert_eq!(unit.commit_step(1), 1);
        assert_eq!(unit.read("a", false), Ok(2));
        assert_eq!(unit.staged_at(1), 0);
    }

    #[test]
    fn inner_commit_leaves_outer_entries_staged() {
        let mut unit = Unit::new(Coord::pair(0, 0), vec![]);
        unit.write("a", 7, 1);
        unit.write("a", 8, 2);
        unit.write("b", 9, 2);
        assert_eq!(unit.read("a", true), Ok(8));
        unit.commit_step(2);
        assert_eq!(unit.read("a", false), Ok(8));
        assert_eq!(unit.read("b", false), Ok(9));
        assert_eq!(unit.staged_at(1), 1);
        assert_eq!(unit.read("a", true), Ok(7));
        unit.commit_step(1);
        assert_eq!(unit.read("a", false), Ok(7));
    }

    #[test]
    fn abort_discards_only_this_depth() {
        let mut unit = Unit::new(Coord::single(0), vec![]);
        unit.write("a", 1, 1);
        unit.write("b", 2, 2);
        unit.abort_step(2);
        assert_eq!(unit.staged_at(1), 1);
        assert_eq!(unit.staged_at(2), 0);
        unit.abort_step(1);
        assert_eq!(unit.staged_at(1), 0);
        assert!(unit.committed().is_empty());
    }

    #[test]
    fn coord_display() {
        assert_eq!(Coord::from(4).to_string(), "[4]");
        assert_eq!(Coord::from((1, 2)).to_string(), "[1,2]");
    }
}
