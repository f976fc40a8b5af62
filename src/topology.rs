//! Topology module: networks of units with fixed, symmetric adjacency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::config::FeedConfig;
use crate::error::{BspError, Result};
use crate::plan::{index_of, AdjacencyPlan, TopologyKind};
use crate::scheduler::{superstep, Machine, Scheduler, StepReport};
use crate::unit::{Coord, Unit, UnitId};
use crate::Value;
use std::fmt;
use tracing::debug;

/// A network of units built from an [`AdjacencyPlan`].
///
/// Adjacency is fixed at construction. Unit state changes only through
/// direct feeding outside supersteps or through [`Topology::forall`].
#[derive(Debug, Clone)]
pub struct Topology {
    kind: TopologyKind,
    units: Vec<Unit>,
    edges: usize,
    scheduler: Scheduler,
}

impl Topology {
    /// Build the topology described by `kind`.
    pub fn build(kind: TopologyKind) -> Result<Self> {
        let plan = AdjacencyPlan::compile(kind)?;
        let edges = plan.edge_count();
        let units: Vec<Unit> = plan
            .coords
            .into_iter()
            .zip(plan.adjacency)
            .map(|(coord, neighbors)| Unit::new(coord, neighbors))
            .collect();
        debug!(topology = kind.label(), units = units.len(), edges, "topology built");
        Ok(Self {
            kind,
            units,
            edges,
            scheduler: Scheduler::new(),
        })
    }

    /// An `n` x `n` grid, optionally with wraparound links.
    pub fn grid(n: usize, wraparound: bool) -> Result<Self> {
        Self::build(TopologyKind::Grid { n, wraparound })
    }

    /// A `k`-dimensional hypercube of 2^k units.
    pub fn hypercube(k: u32) -> Result<Self> {
        Self::build(TopologyKind::Hypercube { k })
    }

    /// A butterfly with `k + 1` levels of 2^k units.
    pub fn butterfly(k: u32) -> Result<Self> {
        Self::build(TopologyKind::Butterfly { k })
    }

    /// A shuffle-exchange network of 2^p units.
    pub fn shuffle_exchange(p: u32) -> Result<Self> {
        Self::build(TopologyKind::ShuffleExchange { p })
    }

    /// What this topology was built from.
    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when the topology has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of undirected links.
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// All units in row-major order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Resolve `coord` to a unit position.
    pub fn unit_id(&self, coord: impl Into<Coord>) -> Result<UnitId> {
        let coord = coord.into();
        index_of(self.kind, coord).ok_or(BspError::IndexOutOfRange { coord })
    }

    /// The unit at `coord`.
    pub fn unit(&self, coord: impl Into<Coord>) -> Result<&Unit> {
        let id = self.unit_id(coord)?;
        Ok(&self.units[id.0])
    }

    /// Coordinates of the units linked to `coord`.
    pub fn neighbor_coords(&self, coord: impl Into<Coord>) -> Result<Vec<Coord>> {
        let unit = self.unit(coord)?;
        Ok(unit
            .neighbors()
            .iter()
            .map(|n| self.units[n.0].coord())
            .collect())
    }

    /// Committed value of `name` on the unit at `coord`.
    pub fn get(&self, coord: impl Into<Coord>, name: &str) -> Result<Value> {
        self.unit(coord)?.read(name, false)
    }

    /// Write `name` on the unit at `coord`; commits immediately outside a superstep.
    pub fn set(&mut self, coord: impl Into<Coord>, name: &str, value: Value) -> Result<()> {
        let id = self.unit_id(coord)?;
        let depth = self.scheduler.depth();
        self.units[id.0].write(name, value, depth);
        Ok(())
    }

    /// Feed `values` into variable `name`, one per unit in row-major order.
    pub fn feed(&mut self, name: &str, values: &[Value]) -> Result<()> {
        if values.len() != self.units.len() {
            return Err(BspError::PreconditionViolation(format!(
                "{} expects {} values for '{}', got {}",
                self.kind.label(),
                self.units.len(),
                name,
                values.len()
            )));
        }
        let depth = self.scheduler.depth();
        for (unit, value) in self.units.iter_mut().zip(values) {
            unit.write(name, *value, depth);
        }
        Ok(())
    }

    /// Fill every unit's configured variables with seeded random values.
    pub fn random_feed(&mut self, config: &FeedConfig) -> Result<()> {
        let values = config.values(self.units.len() * config.vars.len())?;
        let depth = self.scheduler.depth();
        let mut drawn = values.into_iter();
        for unit in self.units.iter_mut() {
            for var in &config.vars {
                if let Some(value) = drawn.next() {
                    unit.write(var, value, depth);
                }
            }
        }
        Ok(())
    }

    /// Committed values of `name` across all units in row-major order.
    pub fn variable(&self, name: &str) -> Result<Vec<Value>> {
        self.units.iter().map(|u| u.read(name, false)).collect()
    }

    /// Run `f` over `indices` as one superstep.
    ///
    /// The closure gets a [`Proc`] handle for the unit being processed. Its
    /// writes are staged and become visible to other units only after the
    /// step's barrier.
    pub fn forall<I, F>(&mut self, indices: I, mut f: F) -> Result<StepReport>
    where
        I: IntoIterator,
        I::Item: Into<Coord>,
        F: FnMut(&mut Proc<'_>) -> Result<()>,
    {
        superstep(self, indices, |net, coord| {
            let id = net.unit_id(coord)?;
            let mut handle = Proc { net, id };
            f(&mut handle)
        })
    }

    /// A handle on one unit outside any superstep, for sequential phases.
    pub fn handle(&mut self, coord: impl Into<Coord>) -> Result<Proc<'_>> {
        let id = self.unit_id(coord)?;
        Ok(Proc { net: self, id })
    }

    fn read_from(&self, from: UnitId, name: &str, target: Coord, fresh: bool) -> Result<Value> {
        let unit = &self.units[from.0];
        let linked = unit
            .neighbors()
            .iter()
            .find(|n| self.units[n.0].coord() == target);
        match linked {
            Some(n) => self.units[n.0].read(name, fresh),
            None => {
                self.unit_id(target)?;
                Err(BspError::NoSuchNeighbor {
                    from: unit.coord(),
                    to: target,
                })
            }
        }
    }
}

impl Machine for Topology {
    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn resolve(&self, coord: Coord) -> Result<()> {
        self.unit_id(coord).map(|_| ())
    }

    fn begin_step(&mut self, depth: usize, indices: &[Coord]) {
        for &coord in indices {
            if let Ok(id) = self.unit_id(coord) {
                self.units[id.0].begin_step(depth);
            }
        }
    }

    fn commit_step(&mut self, depth: usize, _indices: &[Coord]) -> usize {
        self.units.iter_mut().map(|u| u.commit_step(depth)).sum()
    }

    fn abort_step(&mut self, depth: usize, _indices: &[Coord]) {
        for unit in self.units.iter_mut() {
            unit.abort_step(depth);
        }
    }

    fn staged_at(&self, depth: usize) -> usize {
        if depth == 0 {
            return 0;
        }
        self.units.iter().map(|u| u.staged_at(depth)).sum()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.kind.label())?;
        let mut row = None;
        for unit in &self.units {
            let coord = unit.coord();
            if coord.j.is_some() && row.is_some() && row != Some(coord.i) {
                writeln!(f)?;
            }
            row = Some(coord.i);
            let vars: Vec<String> = unit
                .committed()
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            write!(f, "{}({})\t", coord, vars.join(","))?;
        }
        Ok(())
    }
}

/// A unit as seen by the per-unit function of a superstep.
pub struct Proc<'a> {
    net: &'a mut Topology,
    id: UnitId,
}

impl<'a> Proc<'a> {
    /// Coordinates of this unit.
    pub fn coord(&self) -> Coord {
        self.net.units[self.id.0].coord()
    }

    /// Second coordinate (column) of this unit.
    pub fn col(&self) -> Result<usize> {
        let coord = self.coord();
        coord.j.ok_or_else(|| {
            BspError::PreconditionViolation(format!(
                "unit {coord} of a {} has no column coordinate",
                self.net.kind.label()
            ))
        })
    }

    /// Read this unit's own variable, including its writes from this step.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.net.units[self.id.0].read(name, true)
    }

    /// Write this unit's own variable.
    pub fn set(&mut self, name: &str, value: Value) {
        let depth = self.net.scheduler.depth();
        self.net.units[self.id.0].write(name, value, depth);
    }

    /// Read `name` from a linked unit as it was before this step.
    pub fn get_from(&self, name: &str, target: impl Into<Coord>) -> Result<Value> {
        self.net.read_from(self.id, name, target.into(), false)
    }

    /// Read `name` from a linked unit, seeing that unit's writes from this step.
    ///
    /// The result depends on whether the source was processed earlier in the
    /// step, so algorithms that need order independence use [`Proc::get_from`].
    pub fn get_fresh_from(&self, name: &str, target: impl Into<Coord>) -> Result<Value> {
        self.net.read_from(self.id, name, target.into(), true)
    }

    /// Coordinates of this unit's neighbors.
    pub fn neighbors(&self) -> Vec<Coord> {
        self.net.units[self.id.0]
            .neighbors()
            .iter()
            .map(|n| self.net.units[n.0].coord())
            .collect()
    }

    /// The whole network, for running a nested superstep from inside this one.
    ///
    /// The nested step must not write units this step also writes.
    pub fn network(&mut self) -> &mut Topology {
        self.net
    }
}
