//! Shared-memory model: a PRAM whose processes address common vectors.
//!
//! Vectors are 1-indexed by convention, slot 0 is left unset. A vector used
//! as an implicit binary heap holds 2n slots: internal nodes in `1..n` and
//! leaves in `n..2n`.

use crate::error::{require_power_of_two, BspError, Result};
use crate::invariant_ppt::{assert_invariant, HEAP_SHAPE_VALID};
use crate::scheduler::{superstep, Machine, Scheduler, StepReport};
use crate::unit::Coord;
use crate::Value;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, warn};

/// Handle to a vector owned by a [`Pram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VecId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Staged {
    value: Value,
    writer: Option<Coord>,
}

/// One shared vector: committed slots plus writes staged per superstep depth.
#[derive(Debug, Clone)]
pub struct SyncVector {
    name: String,
    committed: Vec<Option<Value>>,
    staged: BTreeMap<usize, BTreeMap<usize, Staged>>,
}

impl SyncVector {
    fn new(name: &str, committed: Vec<Option<Value>>) -> Self {
        Self {
            name: name.to_string(),
            committed,
            staged: BTreeMap::new(),
        }
    }

    /// Name given at allocation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots, slot 0 included.
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// True when the vector has no slots.
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Committed contents.
    pub fn committed(&self) -> &[Option<Value>] {
        &self.committed
    }

    fn staged_at(&self, depth: usize) -> usize {
        self.staged
            .values()
            .filter(|layers| layers.contains_key(&depth))
            .count()
    }

    fn commit(&mut self, depth: usize) -> usize {
        let mut merged = 0;
        for (slot, layers) in self.staged.iter_mut() {
            let ready = layers.split_off(&depth);
            if let Some(staged) = ready.values().next_back() {
                self.committed[*slot] = Some(staged.value);
                merged += 1;
            }
        }
        self.staged.retain(|_, layers| !layers.is_empty());
        merged
    }

    fn abort(&mut self, depth: usize) {
        for layers in self.staged.values_mut() {
            layers.retain(|d, _| *d < depth);
        }
        self.staged.retain(|_, layers| !layers.is_empty());
    }
}

/// A parallel random-access machine over a set of shared vectors.
///
/// Inside a superstep a write is staged and tagged with the process that
/// made it. A read returns a staged value only to that process, or to a
/// process running in a superstep nested inside it; everyone else keeps
/// seeing the committed value until the barrier.
#[derive(Debug, Clone, Default)]
pub struct Pram {
    vectors: Vec<Option<SyncVector>>,
    scheduler: Scheduler,
}

impl Pram {
    /// An empty machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// The machine's scheduler state.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Allocate `slots` unset slots.
    pub fn alloc(&mut self, name: &str, slots: usize) -> VecId {
        self.insert(SyncVector::new(name, vec![None; slots]))
    }

    /// Allocate a vector holding `values`, committed immediately.
    pub fn alloc_values(&mut self, name: &str, values: &[Value]) -> VecId {
        self.insert(SyncVector::new(
            name,
            values.iter().copied().map(Some).collect(),
        ))
    }

    /// Allocate a heap of 2n slots with zeros at `1..n` and `leaves` at `n..2n`.
    pub fn heap_from_leaves(&mut self, name: &str, leaves: &[Value]) -> Result<VecId> {
        let n = leaves.len();
        require_power_of_two("heap leaf count", n)?;
        let mut slots = vec![None; 2 * n];
        for slot in slots.iter_mut().take(n).skip(1) {
            *slot = Some(0);
        }
        for (slot, leaf) in slots.iter_mut().skip(n).zip(leaves) {
            *slot = Some(*leaf);
        }
        assert_invariant(
            HEAP_SHAPE_VALID,
            slots.len() == 2 * n && slots[n..].iter().all(Option::is_some),
            "heap holds 2n slots with every leaf set",
            Some(name),
        );
        Ok(self.insert(SyncVector::new(name, slots)))
    }

    /// Release a vector; later use of `id` fails with `UnknownVector`.
    ///
    /// A nested superstep may not free a vector holding writes staged by an
    /// enclosing step; those writes still have to reach their barrier.
    pub fn free(&mut self, id: VecId) -> Result<()> {
        let depth = self.scheduler.depth();
        let vector = self.vector(id)?;
        if vector
            .staged
            .values()
            .any(|layers| layers.range(..depth).next().is_some())
        {
            return Err(BspError::PreconditionViolation(format!(
                "vector '{}' holds writes staged by an enclosing superstep",
                vector.name
            )));
        }
        self.vectors[id.0] = None;
        Ok(())
    }

    /// The vector behind `id`.
    pub fn vector(&self, id: VecId) -> Result<&SyncVector> {
        self.vectors
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(BspError::UnknownVector(id))
    }

    /// Committed contents of `id`.
    pub fn values(&self, id: VecId) -> Result<&[Option<Value>]> {
        Ok(self.vector(id)?.committed())
    }

    /// Committed values of `range`, failing on the first unset slot.
    pub fn slice(&self, id: VecId, range: Range<usize>) -> Result<Vec<Value>> {
        let vector = self.vector(id)?;
        range
            .map(|slot| match vector.committed.get(slot) {
                Some(Some(value)) => Ok(*value),
                Some(None) => Err(BspError::UnsetVariable {
                    unit: Coord::single(slot),
                    name: vector.name.clone(),
                }),
                None => Err(BspError::IndexOutOfRange {
                    coord: Coord::single(slot),
                }),
            })
            .collect()
    }

    /// Number of slots in `id`.
    pub fn len(&self, id: VecId) -> Result<usize> {
        Ok(self.vector(id)?.len())
    }

    /// Read slot `slot` of `id` as seen by the running process.
    pub fn read(&self, id: VecId, slot: usize) -> Result<Value> {
        let vector = self.vector(id)?;
        let committed = *vector
            .committed
            .get(slot)
            .ok_or(BspError::IndexOutOfRange {
                coord: Coord::single(slot),
            })?;
        if let Some(layers) = vector.staged.get(&slot) {
            for (depth, staged) in layers.iter().rev() {
                if self.scheduler.process_at(*depth) == staged.writer {
                    return Ok(staged.value);
                }
            }
        }
        committed.ok_or_else(|| BspError::UnsetVariable {
            unit: Coord::single(slot),
            name: vector.name.clone(),
        })
    }

    /// Write slot `slot` of `id`; commits immediately outside a superstep.
    pub fn write(&mut self, id: VecId, slot: usize, value: Value) -> Result<()> {
        let depth = self.scheduler.depth();
        let writer = self.scheduler.process();
        let vector = self
            .vectors
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(BspError::UnknownVector(id))?;
        if slot >= vector.committed.len() {
            return Err(BspError::IndexOutOfRange {
                coord: Coord::single(slot),
            });
        }
        if depth == 0 {
            vector.committed[slot] = Some(value);
            return Ok(());
        }
        let staged = Staged { value, writer };
        let previous = vector
            .staged
            .entry(slot)
            .or_default()
            .insert(depth, staged);
        if let Some(previous) = previous.filter(|p| p.writer != writer) {
            warn!(
                vector = %vector.name,
                slot,
                depth,
                first = ?previous.writer,
                second = ?writer,
                "two processes wrote the same slot in one superstep"
            );
        }
        Ok(())
    }

    /// Run `f` over `indices` as one superstep.
    pub fn forall<I, F>(&mut self, indices: I, f: F) -> Result<StepReport>
    where
        I: IntoIterator,
        I::Item: Into<Coord>,
        F: FnMut(&mut Pram, Coord) -> Result<()>,
    {
        superstep(self, indices, f)
    }

    fn insert(&mut self, vector: SyncVector) -> VecId {
        let id = VecId(self.vectors.len());
        debug!(vector = %vector.name, slots = vector.len(), ?id, "vector allocated");
        self.vectors.push(Some(vector));
        id
    }

    fn live(&mut self) -> impl Iterator<Item = &mut SyncVector> {
        self.vectors.iter_mut().flatten()
    }
}

impl Machine for Pram {
    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn resolve(&self, _coord: Coord) -> Result<()> {
        Ok(())
    }

    fn begin_step(&mut self, depth: usize, _indices: &[Coord]) {
        self.live().for_each(|v| v.abort(depth));
    }

    fn commit_step(&mut self, depth: usize, _indices: &[Coord]) -> usize {
        self.live().map(|v| v.commit(depth)).sum()
    }

    fn abort_step(&mut self, depth: usize, _indices: &[Coord]) {
        self.live().for_each(|v| v.abort(depth));
    }

    fn staged_at(&self, depth: usize) -> usize {
        self.vectors.iter().flatten().map(|v| v.staged_at(depth)).sum()
    }
}
