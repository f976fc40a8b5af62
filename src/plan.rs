//! Plan module: compile a topology description into a complete adjacency plan.
//!
//! The plan is a pure function of the size parameters. Units are only built
//! from a finished plan, so a partially wired topology is never observable.

use crate::error::{BspError, Result};
use crate::invariant_ppt::{assert_invariant, ADJACENCY_COMPLETE, ADJACENCY_SYMMETRIC};
use crate::unit::{Coord, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The four interconnection networks the simulator can build.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyKind {
    /// n x n grid, optionally with wraparound links on rows and columns.
    Grid {
        /// Side length.
        n: usize,
        /// Link the first and last unit of every row and column.
        wraparound: bool,
    },
    /// 2^k units linked along every bit position.
    Hypercube {
        /// Dimension.
        k: u32,
    },
    /// (k+1) levels of 2^k units.
    Butterfly {
        /// Number of stages.
        k: u32,
    },
    /// 2^p units with exchange and perfect-shuffle links.
    ShuffleExchange {
        /// log2 of the unit count.
        p: u32,
    },
}

impl TopologyKind {
    /// Human-readable label used by `Display` impls and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TopologyKind::Grid { .. } => "GRID",
            TopologyKind::Hypercube { .. } => "HYPERCUBE",
            TopologyKind::Butterfly { .. } => "BUTTERFLY",
            TopologyKind::ShuffleExchange { .. } => "SHUFFLE-EXCHANGE",
        }
    }
}

/// The compiled plan: unit coordinates and their neighbor lists.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyPlan {
    /// What was compiled.
    pub kind: TopologyKind,
    /// Coordinates in unit order (row-major for two-coordinate topologies).
    pub coords: Vec<Coord>,
    /// Sorted, de-duplicated neighbors of every unit.
    pub adjacency: Vec<Vec<UnitId>>,
}

impl AdjacencyPlan {
    /// Compile the adjacency plan for `kind`.
    pub fn compile(kind: TopologyKind) -> Result<Self> {
        let coords = layout(kind)?;
        let mut links = vec![BTreeSet::new(); coords.len()];
        for (a, b) in edges(kind) {
            links[a.0].insert(b);
            links[b.0].insert(a);
        }
        let adjacency: Vec<Vec<UnitId>> = links
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();

        let plan = Self {
            kind,
            coords,
            adjacency,
        };
        assert_invariant(
            ADJACENCY_SYMMETRIC,
            plan.is_symmetric(),
            "every link is registered on both endpoints",
            Some(kind.label()),
        );
        assert_invariant(
            ADJACENCY_COMPLETE,
            plan.adjacency.len() == plan.coords.len(),
            "every unit has a neighbor list",
            Some(kind.label()),
        );
        Ok(plan)
    }

    /// Number of units in the plan.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// True when the plan holds no units.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of undirected links; a self-loop counts once.
    pub fn edge_count(&self) -> usize {
        self.adjacency
            .iter()
            .enumerate()
            .map(|(a, nbs)| nbs.iter().filter(|b| b.0 >= a).count())
            .sum()
    }

    /// Position of `coord` in unit order.
    pub fn index_of(&self, coord: Coord) -> Option<UnitId> {
        index_of(self.kind, coord)
    }

    fn is_symmetric(&self) -> bool {
        self.adjacency.iter().enumerate().all(|(a, nbs)| {
            nbs.iter()
                .all(|b| self.adjacency[b.0].binary_search(&UnitId(a)).is_ok())
        })
    }
}

/// Largest topology the builder accepts, in units.
pub const MAX_PLAN_UNITS: usize = 1 << 24;

fn unit_count(kind: TopologyKind) -> Option<usize> {
    match kind {
        TopologyKind::Grid { n, .. } => n.checked_mul(n),
        TopologyKind::Hypercube { k } => 1usize.checked_shl(k),
        TopologyKind::Butterfly { k } => 1usize.checked_shl(k)?.checked_mul(k as usize + 1),
        TopologyKind::ShuffleExchange { p } => 1usize.checked_shl(p),
    }
}

fn layout(kind: TopologyKind) -> Result<Vec<Coord>> {
    if matches!(kind, TopologyKind::Grid { n: 0, .. }) {
        return Err(BspError::PreconditionViolation(
            "grid side must be at least 1".into(),
        ));
    }
    unit_count(kind)
        .filter(|units| *units <= MAX_PLAN_UNITS)
        .ok_or_else(|| {
            BspError::PreconditionViolation(format!(
                "{kind:?} exceeds the limit of {MAX_PLAN_UNITS} units"
            ))
        })?;
    let coords = match kind {
        TopologyKind::Grid { n, .. } => (0..n)
            .flat_map(|i| (0..n).map(move |j| Coord::pair(i, j)))
            .collect(),
        TopologyKind::Hypercube { k } => (0..1usize << k).map(Coord::single).collect(),
        TopologyKind::Butterfly { k } => {
            let cols = 1usize << k;
            (0..=k as usize)
                .flat_map(|level| (0..cols).map(move |col| Coord::pair(level, col)))
                .collect()
        }
        TopologyKind::ShuffleExchange { p } => (0..1usize << p).map(Coord::single).collect(),
    };
    Ok(coords)
}

pub(crate) fn index_of(kind: TopologyKind, coord: Coord) -> Option<UnitId> {
    match (kind, coord.j) {
        (TopologyKind::Grid { n, .. }, Some(j)) if coord.i < n && j < n => {
            Some(UnitId(coord.i * n + j))
        }
        (TopologyKind::Butterfly { k }, Some(col)) => {
            let cols = 1usize << k;
            (coord.i <= k as usize && col < cols).then(|| UnitId(coord.i * cols + col))
        }
        (TopologyKind::Hypercube { k }, None) if coord.i < (1usize << k) => {
            Some(UnitId(coord.i))
        }
        (TopologyKind::ShuffleExchange { p }, None) if coord.i < (1usize << p) => {
            Some(UnitId(coord.i))
        }
        _ => None,
    }
}

/// Undirected links as (unit, unit) pairs; duplicates are folded by the caller.
fn edges(kind: TopologyKind) -> Vec<(UnitId, UnitId)> {
    let mut out = Vec::new();
    match kind {
        TopologyKind::Grid { n, wraparound } => {
            let id = |i: usize, j: usize| UnitId(i * n + j);
            for i in 0..n {
                for j in 0..n {
                    if i + 1 < n {
                        out.push((id(i, j), id(i + 1, j)));
                    }
                    if j + 1 < n {
                        out.push((id(i, j), id(i, j + 1)));
                    }
                }
            }
            if wraparound {
                for i in 0..n {
                    out.push((id(i, 0), id(i, n - 1)));
                    out.push((id(0, i), id(n - 1, i)));
                }
            }
        }
        TopologyKind::Hypercube { k } => {
            for m in 0..(1usize << k) {
                for h in 0..k {
                    let bit = 1usize << h;
                    if m & bit == 0 {
                        out.push((UnitId(m), UnitId(m | bit)));
                    }
                }
            }
        }
        TopologyKind::Butterfly { k } => {
            let cols = 1usize << k;
            let id = |level: usize, col: usize| UnitId(level * cols + col);
            for level in 0..k as usize {
                let cross = 1usize << (k as usize - 1 - level);
                for col in 0..cols {
                    out.push((id(level, col), id(level + 1, col)));
                    out.push((id(level, col), id(level + 1, col ^ cross)));
                }
            }
        }
        TopologyKind::ShuffleExchange { p } => {
            let n = 1usize << p;
            for i in (0..n).step_by(2) {
                if i + 1 < n {
                    out.push((UnitId(i), UnitId(i + 1)));
                }
            }
            for i in 0..n - 1 {
                out.push((UnitId(i), UnitId((2 * i) % (n - 1))));
            }
            out.push((UnitId(n - 1), UnitId(n - 1)));
        }
    }
    out
}
