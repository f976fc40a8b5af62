//! PRAM algorithms over shared heap vectors.
//!
//! Everything here is exclusive-read except [`tournament_sort_crew`], whose
//! comparison step lets n processes read the same input slot.

use crate::error::{add_at, require_power_of_two, sub_at, BspError, Result};
use crate::index::IndexSet;
use crate::shared::{Pram, VecId};
use crate::Value;

fn require_slots(pram: &Pram, id: VecId, slots: usize) -> Result<()> {
    let len = pram.len(id)?;
    if len < slots {
        let name = pram.vector(id)?.name().to_string();
        return Err(BspError::PreconditionViolation(format!(
            "vector '{name}' has {len} slots, needs {slots}"
        )));
    }
    Ok(())
}

/// Fold heap levels `levels-1 .. 0` of `a` with `op`, leaving the result at
/// slot 1. `op` returns `None` when the result does not fit.
fn reduce_levels<F>(pram: &mut Pram, a: VecId, levels: u32, op: &F) -> Result<Value>
where
    F: Fn(Value, Value) -> Option<Value>,
{
    for k in (0..levels).rev() {
        pram.forall(1usize << k..1usize << (k + 1), |m, p| {
            let i = p.i;
            let folded = op(m.read(a, 2 * i)?, m.read(a, 2 * i + 1)?)
                .ok_or(BspError::Overflow { unit: p })?;
            m.write(a, i, folded)
        })?;
    }
    pram.read(a, 1)
}

fn reduce_leaves<F>(pram: &mut Pram, a: VecId, n: usize, op: &F) -> Result<Value>
where
    F: Fn(Value, Value) -> Option<Value>,
{
    let levels = require_power_of_two("leaf count", n)?;
    require_slots(pram, a, 2 * n)?;
    reduce_levels(pram, a, levels, op)
}

/// Combine the n leaves `a[n..2n]` with the associative `op`; n processes,
/// log n supersteps. The result is returned and stored at `a[1]`.
pub fn associative_reduce<F>(pram: &mut Pram, a: VecId, n: usize, op: F) -> Result<Value>
where
    F: Fn(Value, Value) -> Value,
{
    reduce_leaves(pram, a, n, &|x, y| Some(op(x, y)))
}

/// Sum the n leaves `a[n..2n]`. Fails with [`BspError::Overflow`] when a
/// partial sum leaves the `i64` range.
pub fn sum(pram: &mut Pram, a: VecId, n: usize) -> Result<Value> {
    reduce_leaves(pram, a, n, &Value::checked_add)
}

/// Sum the n leaves `a[n..2n]` with n / log n processes.
///
/// Each process first adds up a group of log n consecutive leaves on its
/// own, then the n / log n partial sums are folded as a heap. Both n and
/// log n must be powers of two, and n at least 4.
pub fn sum_optimal(pram: &mut Pram, a: VecId, n: usize) -> Result<Value> {
    let log_n = require_power_of_two("leaf count", n)? as usize;
    if n < 4 || !crate::error::is_power_of_two(log_n) {
        return Err(BspError::PreconditionViolation(format!(
            "n and log(n) must both be powers of two with n >= 4, got n = {n}"
        )));
    }
    require_slots(pram, a, 2 * n)?;

    pram.forall(IndexSet::range(n..2 * n).step_by(log_n), |m, p| {
        let mut group = 0;
        for j in p.i..p.i + log_n {
            group = add_at(p, group, m.read(a, j)?)?;
        }
        m.write(a, p.i / log_n, group)
    })?;

    let levels = require_power_of_two("group count", n / log_n)?;
    reduce_levels(pram, a, levels, &Value::checked_add)
}

/// Inclusive prefix sums of the leaves of `a`, written to the leaves
/// `b[n..2n]`.
///
/// `a` is reduced first so that its internal nodes hold subtree sums; the
/// root of `b` is seeded with the total and each level then derives a right
/// child from its parent and a left child from its parent minus its right
/// sibling's subtree sum.
pub fn prefix_sum(pram: &mut Pram, a: VecId, b: VecId, n: usize) -> Result<()> {
    let levels = require_power_of_two("leaf count", n)?;
    require_slots(pram, b, 2 * n)?;
    let total = sum(pram, a, n)?;
    pram.write(b, 1, total)?;

    for k in 1..=levels {
        pram.forall(1usize << k..1usize << (k + 1), |m, p| {
            let i = p.i;
            let parent = m.read(b, i / 2)?;
            let value = if i % 2 == 1 {
                parent
            } else {
                sub_at(p, parent, m.read(a, i + 1)?)?
            };
            m.write(b, i, value)
        })?;
    }
    Ok(())
}

/// Copy `datum` into `cpy[1..=n]` by doubling the filled prefix every step,
/// so no slot is read by two processes at once.
pub fn replicate(pram: &mut Pram, cpy: VecId, datum: Value, n: usize) -> Result<()> {
    let levels = require_power_of_two("copy count", n)?;
    require_slots(pram, cpy, n + 1)?;
    pram.write(cpy, 1, datum)?;
    for k in 0..levels {
        let filled = 1usize << k;
        pram.forall(1..=filled, |m, p| {
            let value = m.read(cpy, p.i)?;
            m.write(cpy, p.i + filled, value)
        })?;
    }
    Ok(())
}

/// Sort `a[1..=n]` ascending with n^2 processes, reading concurrently.
///
/// Values must be pairwise distinct.
pub fn tournament_sort_crew(pram: &mut Pram, a: VecId, n: usize) -> Result<()> {
    require_power_of_two("input length", n)?;
    require_slots(pram, a, n + 1)?;
    let width = n + 1;
    let wins = pram.alloc("V", width * width);

    pram.forall(IndexSet::grid(1..n + 1, 1..n + 1), |m, p| {
        let (i, j) = (p.i, p.j.unwrap_or_default());
        let won = m.read(a, i)? <= m.read(a, j)?;
        m.write(wins, i * width + j, Value::from(won))
    })?;

    place_by_rank(pram, a, wins, n)?;
    pram.free(wins)
}

/// Sort `a[1..=n]` ascending with n^2 processes and exclusive reads only.
///
/// Every value is first replicated into a row vector and a column vector
/// (nested supersteps), so each comparison reads its own private copies.
/// Values must be pairwise distinct.
pub fn tournament_sort_erew(pram: &mut Pram, a: VecId, n: usize) -> Result<()> {
    require_power_of_two("input length", n)?;
    require_slots(pram, a, n + 1)?;
    let width = n + 1;
    let rows: Vec<VecId> = (0..width).map(|_| pram.alloc("R", width)).collect();
    let cols: Vec<VecId> = (0..width).map(|_| pram.alloc("C", width)).collect();
    let wins = pram.alloc("V", width * width);

    pram.forall(1..n + 1, |m, p| {
        let datum = m.read(a, p.i)?;
        replicate(m, rows[p.i], datum, n)?;
        replicate(m, cols[p.i], datum, n)
    })?;

    pram.forall(IndexSet::grid(1..n + 1, 1..n + 1), |m, p| {
        let (i, j) = (p.i, p.j.unwrap_or_default());
        let won = m.read(rows[i], j)? <= m.read(cols[j], i)?;
        m.write(wins, i * width + j, Value::from(won))
    })?;

    place_by_rank(pram, a, wins, n)?;
    for id in rows.into_iter().chain(cols).chain([wins]) {
        pram.free(id)?;
    }
    Ok(())
}

/// Sum every column of the win matrix with a nested reduction and move each
/// value of `a` to the slot given by its rank.
fn place_by_rank(pram: &mut Pram, a: VecId, wins: VecId, n: usize) -> Result<()> {
    let width = n + 1;
    let ranks = pram.alloc("S", width);

    pram.forall(1..n + 1, |m, p| {
        let leaves = (1..=n)
            .map(|k| m.read(wins, k * width + p.i))
            .collect::<Result<Vec<Value>>>()?;
        let column = m.heap_from_leaves("subsum", &leaves)?;
        let rank = sum(m, column, n)?;
        m.free(column)?;
        m.write(ranks, p.i, rank)
    })?;

    pram.forall(1..n + 1, |m, p| {
        let rank = m.read(ranks, p.i)?;
        let slot = usize::try_from(rank)
            .ok()
            .filter(|slot| (1..=n).contains(slot))
            .ok_or_else(|| {
                BspError::PreconditionViolation(format!(
                    "rank {rank} of slot {} is out of range; input values must be distinct",
                    p.i
                ))
            })?;
        let value = m.read(a, p.i)?;
        m.write(a, slot, value)
    })?;
    pram.free(ranks)
}
