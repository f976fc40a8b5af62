//! Scheduler module: the superstep barrier engine.
//!
//! A superstep runs a per-unit function once for every index of an index
//! set. Writes made during the step are staged and only merged into
//! committed state at the barrier, after every index has been processed.
//! A failure for any index aborts the whole step: its staged writes are
//! discarded and committed state is left as it was before the step.
//!
//! The "currently parallel" state is an explicit [`Scheduler`] value owned by
//! each machine, not process-global state. Nested supersteps push a new frame
//! on top of the active one and commit only their own layer.

use crate::error::Result;
use crate::invariant_ppt::{
    assert_invariant, NESTED_STEP_ISOLATION, STEP_ABORT_CLEAN, STEP_ATOMIC_COMMIT,
    STEP_DEPTH_RESTORED,
};
use crate::unit::Coord;
use tracing::{debug, trace, warn};

/// One active superstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Nesting depth, 1 for the outermost step.
    pub depth: usize,
    /// The index currently being processed.
    pub process: Option<Coord>,
}

/// Explicit scheduler state threaded through a machine.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    frames: Vec<Frame>,
    steps_committed: u64,
}

impl Scheduler {
    /// A scheduler with no active superstep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active (nested) supersteps; 0 outside any step.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True while any superstep is active.
    pub fn is_parallel(&self) -> bool {
        !self.frames.is_empty()
    }

    /// The index being processed by the innermost active step.
    pub fn process(&self) -> Option<Coord> {
        self.frames.last().and_then(|f| f.process)
    }

    /// The index being processed by the active step at `depth`.
    pub fn process_at(&self, depth: usize) -> Option<Coord> {
        depth
            .checked_sub(1)
            .and_then(|at| self.frames.get(at))
            .and_then(|f| f.process)
    }

    /// Supersteps committed so far, nested ones included.
    pub fn steps_committed(&self) -> u64 {
        self.steps_committed
    }

    fn enter(&mut self) -> usize {
        let depth = self.frames.len() + 1;
        self.frames.push(Frame {
            depth,
            process: None,
        });
        depth
    }

    fn set_process(&mut self, coord: Coord) {
        if let Some(frame) = self.frames.last_mut() {
            frame.process = Some(coord);
        }
    }

    fn leave(&mut self) {
        self.frames.pop();
    }
}

/// A passive data structure the barrier engine can drive.
///
/// Implementors own their [`Scheduler`] and decide what "staged" means for
/// their storage; the engine only sequences begin, per-index work, and
/// commit or abort.
pub trait Machine {
    /// The machine's scheduler state.
    fn scheduler(&self) -> &Scheduler;

    /// Mutable scheduler state.
    fn scheduler_mut(&mut self) -> &mut Scheduler;

    /// Check that `coord` names something this machine can process.
    fn resolve(&self, coord: Coord) -> Result<()>;

    /// Prepare staging for a step at `depth` over `indices`.
    fn begin_step(&mut self, depth: usize, indices: &[Coord]);

    /// Merge everything staged at `depth`; returns the number of merged entries.
    fn commit_step(&mut self, depth: usize, indices: &[Coord]) -> usize;

    /// Discard everything staged at `depth`.
    fn abort_step(&mut self, depth: usize, indices: &[Coord]);

    /// Number of entries currently staged at exactly `depth`.
    fn staged_at(&self, depth: usize) -> usize;
}

/// Outcome of a committed superstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Depth the step ran at.
    pub depth: usize,
    /// Number of indices processed.
    pub processed: usize,
    /// Number of staged entries merged at the barrier.
    pub committed: usize,
}

/// Run `f` once per index as one superstep of `machine`.
///
/// Every index is resolved before any work is done, so an out-of-range
/// coordinate fails the step without side effects. Indices are processed in
/// the order given, but since reads of other units only ever see committed
/// state, results do not depend on that order.
pub fn superstep<M, I, F>(machine: &mut M, indices: I, mut f: F) -> Result<StepReport>
where
    M: Machine,
    I: IntoIterator,
    I::Item: Into<Coord>,
    F: FnMut(&mut M, Coord) -> Result<()>,
{
    let indices: Vec<Coord> = indices.into_iter().map(Into::into).collect();
    for &coord in &indices {
        machine.resolve(coord)?;
    }

    let outer_depth = machine.scheduler().depth();
    let outer_staged = machine.staged_at(outer_depth);
    let depth = machine.scheduler_mut().enter();
    debug!(depth, units = indices.len(), "superstep begin");
    machine.begin_step(depth, &indices);

    for &coord in &indices {
        machine.scheduler_mut().set_process(coord);
        trace!(depth, %coord, "superstep index");
        if let Err(err) = f(machine, coord) {
            machine.abort_step(depth, &indices);
            assert_invariant(
                STEP_ABORT_CLEAN,
                machine.staged_at(depth) == 0,
                "aborted step left staged entries behind",
                Some("superstep"),
            );
            machine.scheduler_mut().leave();
            warn!(depth, %coord, error = %err, "superstep aborted");
            return Err(err);
        }
    }

    let committed = machine.commit_step(depth, &indices);
    assert_invariant(
        STEP_ATOMIC_COMMIT,
        machine.staged_at(depth) == 0,
        "committed step left staged entries behind",
        Some("superstep"),
    );
    machine.scheduler_mut().leave();
    machine.scheduler_mut().steps_committed += 1;
    assert_invariant(
        STEP_DEPTH_RESTORED,
        machine.scheduler().depth() == outer_depth,
        "scheduler depth restored after superstep",
        Some("superstep"),
    );
    if outer_depth > 0 {
        assert_invariant(
            NESTED_STEP_ISOLATION,
            machine.staged_at(outer_depth) == outer_staged,
            "inner superstep changed the enclosing step's staged writes",
            Some("superstep"),
        );
    }
    debug!(depth, committed, "superstep commit");

    Ok(StepReport {
        depth,
        processed: indices.len(),
        committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BspError;
    use std::collections::BTreeMap;

    /// A machine of independent cells: the smallest thing the engine can drive.
    #[derive(Default)]
    struct Cells {
        scheduler: Scheduler,
        committed: BTreeMap<usize, i64>,
        staged: BTreeMap<(usize, usize), i64>,
        size: usize,
    }

    impl Cells {
        fn new(size: usize) -> Self {
            Self {
                size,
                ..Self::default()
            }
        }

        fn read(&self, at: usize) -> i64 {
            self.committed.get(&at).copied().unwrap_or(0)
        }

        fn write(&mut self, at: usize, value: i64) {
            let depth = self.scheduler.depth();
            if depth == 0 {
                self.committed.insert(at, value);
            } else {
                self.staged.insert((depth, at), value);
            }
        }
    }

    impl Machine for Cells {
        fn scheduler(&self) -> &Scheduler {
            &self.scheduler
        }
        fn scheduler_mut(&mut self) -> &mut Scheduler {
            &mut self.scheduler
        }
        fn resolve(&self, coord: Coord) -> Result<()> {
            if coord.i < self.size && coord.j.is_none() {
                Ok(())
            } else {
                Err(BspError::IndexOutOfRange { coord })
            }
        }
        fn begin_step(&mut self, depth: usize, _indices: &[Coord]) {
            self.abort_step(depth, _indices);
        }
        fn commit_step(&mut self, depth: usize, _indices: &[Coord]) -> usize {
            let ready: Vec<(usize, usize)> = self
                .staged
                .keys()
                .filter(|(d, _)| *d == depth)
                .copied()
                .collect();
            for key in &ready {
                if let Some(v) = self.staged.remove(key) {
                    self.committed.insert(key.1, v);
                }
            }
            ready.len()
        }
        fn abort_step(&mut self, depth: usize, _indices: &[Coord]) {
            self.staged.retain(|(d, _), _| *d != depth);
        }
        fn staged_at(&self, depth: usize) -> usize {
            self.staged.keys().filter(|(d, _)| *d == depth).count()
        }
    }

    #[test]
    fn shift_reads_pre_step_values() {
        let mut cells = Cells::new(4);
        for i in 0..4 {
            cells.write(i, i as i64 + 1);
        }
        // Every cell takes its left neighbor's value; order must not leak.
        let report = superstep(&mut cells, 1..4, |m, at| {
            let left = m.read(at.i - 1);
            m.write(at.i, left);
            Ok(())
        })
        .unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.committed, 3);
        let values: Vec<i64> = (0..4).map(|i| cells.read(i)).collect();
        assert_eq!(values, vec![1, 1, 2, 3]);
    }

    #[test]
    fn failure_aborts_without_partial_commit() {
        let mut cells = Cells::new(4);
        let err = superstep(&mut cells, 0..4, |m, at| {
            if at.i == 2 {
                return Err(BspError::PreconditionViolation("boom".into()));
            }
            m.write(at.i, 9);
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err, BspError::PreconditionViolation("boom".into()));
        assert!(cells.committed.is_empty());
        assert!(!cells.scheduler.is_parallel());
    }

    #[test]
    fn unresolved_index_fails_before_work() {
        let mut cells = Cells::new(2);
        let mut calls = 0;
        let err = superstep(&mut cells, [0usize, 5], |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(
            err,
            BspError::IndexOutOfRange {
                coord: Coord::single(5)
            }
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn nested_step_restores_outer_frame() {
        let mut cells = Cells::new(8);
        superstep(&mut cells, 0..2, |m, outer| {
            m.write(outer.i, 100);
            assert_eq!(m.scheduler().depth(), 1);
            superstep(m, 4..6, |m, inner| {
                assert_eq!(m.scheduler().process_at(1), Some(outer));
                assert_eq!(m.scheduler().process(), Some(inner));
                m.write(inner.i, 7);
                Ok(())
            })?;
            assert_eq!(m.scheduler().process(), Some(outer));
            // The inner step is committed, the outer write is still staged.
            assert_eq!(m.read(4), 7);
            assert_eq!(m.read(outer.i), 0);
            Ok(())
        })
        .unwrap();
        assert_eq!(cells.read(0), 100);
        assert_eq!(cells.read(1), 100);
        assert_eq!(cells.scheduler.depth(), 0);
        assert_eq!(cells.scheduler.steps_committed(), 3);
    }
}
