//! Grid (mesh) algorithms.

use super::wrong_topology;
use crate::error::{add_at, mul_at, BspError, Result};
use crate::index::IndexSet;
use crate::plan::TopologyKind;
use crate::topology::Topology;

fn side(net: &Topology) -> Result<(usize, bool)> {
    match net.kind() {
        TopologyKind::Grid { n, wraparound } => Ok((n, wraparound)),
        _ => Err(wrong_topology(net, "GRID")),
    }
}

/// Sum variable `a` over the grid into unit (0,0).
///
/// Columns are folded upwards in parallel, then row 0 is folded right to
/// left by a sequential pass. With `propagate`, the total is copied back to
/// every unit.
pub fn sum(net: &mut Topology, propagate: bool) -> Result<()> {
    let (n, _) = side(net)?;

    for i in (0..n - 1).rev() {
        net.forall(IndexSet::grid(i..i + 1, 0..n), |p| {
            let below = p.get_from("a", (p.coord().i + 1, p.col()?))?;
            let own = p.get("a")?;
            p.set("a", add_at(p.coord(), own, below)?);
            Ok(())
        })?;
    }
    for j in (0..n - 1).rev() {
        let mut p = net.handle((0, j))?;
        let right = p.get_from("a", (0, j + 1))?;
        let own = p.get("a")?;
        let total = add_at(p.coord(), own, right)?;
        p.set("a", total);
    }

    if !propagate {
        return Ok(());
    }
    for j in 1..n {
        let mut p = net.handle((0, j))?;
        let left = p.get_from("a", (0, j - 1))?;
        p.set("a", left);
    }
    for i in 1..n {
        net.forall(IndexSet::grid(i..i + 1, 0..n), |p| {
            let above = p.get_from("a", (p.coord().i - 1, p.col()?))?;
            p.set("a", above);
            Ok(())
        })?;
    }
    Ok(())
}

/// Multiply the matrices fed as `a` and `b` on a wraparound grid; the
/// product lands in `c`.
///
/// Row i of `a` is first rotated left by i and column j of `b` up by j.
/// Each of the n rounds then accumulates `a * b` and rotates both once more.
pub fn matrix_multiply(net: &mut Topology) -> Result<()> {
    let (n, wraparound) = side(net)?;
    if !wraparound {
        return Err(BspError::PreconditionViolation(
            "matrix multiplication needs a grid with wraparound links".into(),
        ));
    }

    for pass in 0..n.saturating_sub(1) {
        net.forall(IndexSet::grid(0..n, 0..n), |p| {
            let (i, j) = (p.coord().i, p.col()?);
            if i > pass {
                let a = p.get_from("a", (i, (j + 1) % n))?;
                p.set("a", a);
            }
            if j > pass {
                let b = p.get_from("b", ((i + 1) % n, j))?;
                p.set("b", b);
            }
            Ok(())
        })?;
    }

    net.forall(IndexSet::grid(0..n, 0..n), |p| {
        p.set("c", 0);
        Ok(())
    })?;

    for _ in 0..n {
        net.forall(IndexSet::grid(0..n, 0..n), |p| {
            let (i, j) = (p.coord().i, p.col()?);
            let term = mul_at(p.coord(), p.get("a")?, p.get("b")?)?;
            let c = add_at(p.coord(), p.get("c")?, term)?;
            p.set("c", c);
            let a = p.get_from("a", (i, (j + 1) % n))?;
            let b = p.get_from("b", ((i + 1) % n, j))?;
            p.set("a", a);
            p.set("b", b);
            Ok(())
        })?;
    }
    Ok(())
}
