//! Hypercube algorithms.
//!
//! Unit m is linked to m XOR 2^p for every bit p, so every exchange below
//! reads from the unit that differs in exactly one bit.

use super::wrong_topology;
use crate::error::{add_at, mul_at, BspError, Result};
use crate::index::IndexSet;
use crate::plan::TopologyKind;
use crate::topology::Topology;

fn dimension(net: &Topology) -> Result<u32> {
    match net.kind() {
        TopologyKind::Hypercube { k } => Ok(k),
        _ => Err(wrong_topology(net, "HYPERCUBE")),
    }
}

fn bit(m: usize, p: u32) -> usize {
    (m >> p) & 1
}

/// Sum variable `a` into unit 0 by folding the cube one dimension at a
/// time; with `propagate` the total is broadcast back to every unit.
pub fn sum(net: &mut Topology, propagate: bool) -> Result<()> {
    let k = dimension(net)?;
    for d in (0..k).rev() {
        let half = 1usize << d;
        net.forall(0..half, |p| {
            let other = p.get_from("a", p.coord().i ^ half)?;
            let own = p.get("a")?;
            p.set("a", add_at(p.coord(), own, other)?);
            Ok(())
        })?;
    }
    if propagate {
        for d in 0..k {
            let half = 1usize << d;
            net.forall(half..2 * half, |p| {
                let source = p.get_from("a", p.coord().i ^ half)?;
                p.set("a", source);
                Ok(())
            })?;
        }
    }
    Ok(())
}

/// Sort variable `a` ascending by unit index with a bitonic merge sort.
///
/// Stage `i` merges bitonic runs of length 2^(i+1); each of its passes is a
/// single compare-exchange superstep in which both partners read the other's
/// committed value, so the result does not depend on index order.
pub fn bitonic_sort(net: &mut Topology) -> Result<()> {
    let k = dimension(net)?;
    let n = 1usize << k;
    for stage in 0..k {
        for pass in (0..=stage).rev() {
            let d = 1usize << pass;
            net.forall(0..n, |p| {
                let h = p.coord().i;
                let theirs = p.get_from("a", h ^ d)?;
                let own = p.get("a")?;
                let ascending = bit(h, stage + 1) == 0;
                let lower = h & d == 0;
                let keep = if lower == ascending {
                    own.min(theirs)
                } else {
                    own.max(theirs)
                };
                p.set("a", keep);
                Ok(())
            })?;
        }
    }
    Ok(())
}

/// Multiply the n x n matrices fed row-major as `a` and `b` into units
/// `0..n*n`; the product lands in `c` on the same units.
///
/// The cube must have dimension 3h with n = 2^h. Unit m is read as the bit
/// triple (k, i, j). Operands are first spread along k, then aligned so that
/// unit (k, i, j) holds a[i][k] and b[k][j], multiplied, and summed back
/// along k.
pub fn matrix_multiply(net: &mut Topology) -> Result<()> {
    let dim = dimension(net)?;
    if dim % 3 != 0 {
        return Err(BspError::PreconditionViolation(format!(
            "matrix multiplication needs a cube dimension divisible by 3, got {dim}"
        )));
    }
    let h = dim / 3;
    let units = 1usize << dim;

    for p in 2 * h..3 * h {
        let flip = 1usize << p;
        net.forall(flip..2 * flip, |u| {
            let a = u.get_from("a", u.coord().i ^ flip)?;
            let b = u.get_from("b", u.coord().i ^ flip)?;
            u.set("a", a);
            u.set("b", b);
            Ok(())
        })?;
    }
    for p in (0..h).rev() {
        let along = IndexSet::range(0..units).filter(|c| bit(c.i, p) != bit(c.i, 2 * h + p));
        net.forall(along, |u| {
            let a = u.get_from("a", u.coord().i ^ (1 << p))?;
            u.set("a", a);
            Ok(())
        })?;
    }
    for p in (h..2 * h).rev() {
        let along = IndexSet::range(0..units).filter(|c| bit(c.i, p) != bit(c.i, h + p));
        net.forall(along, |u| {
            let b = u.get_from("b", u.coord().i ^ (1 << p))?;
            u.set("b", b);
            Ok(())
        })?;
    }

    net.forall(0..units, |u| {
        let c = mul_at(u.coord(), u.get("a")?, u.get("b")?)?;
        u.set("c", c);
        Ok(())
    })?;

    for p in 2 * h..3 * h {
        net.forall(0..units, |u| {
            let other = u.get_from("c", u.coord().i ^ (1 << p))?;
            let own = u.get("c")?;
            u.set("c", add_at(u.coord(), own, other)?);
            Ok(())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_broadcast() {
        let mut net = Topology::hypercube(3).unwrap();
        net.feed("a", &[5, 6, 3, 13, 7, 10, 9, 2]).unwrap();
        sum(&mut net, true).unwrap();
        assert_eq!(net.variable("a").unwrap(), vec![55; 8]);
    }

    #[test]
    fn bitonic_sorts_reversed_input() {
        let mut net = Topology::hypercube(3).unwrap();
        net.feed("a", &[7, 6, 5, 4, 3, 2, 1, 0]).unwrap();
        bitonic_sort(&mut net).unwrap();
        assert_eq!(net.variable("a").unwrap(), (0..8).collect::<Vec<i64>>());
    }

    #[test]
    fn two_by_two_product() {
        let mut net = Topology::hypercube(3).unwrap();
        for (m, (a, b)) in [(1, -5), (2, -6), (3, 7), (4, 8)].into_iter().enumerate() {
            net.set(m, "a", a).unwrap();
            net.set(m, "b", b).unwrap();
        }
        matrix_multiply(&mut net).unwrap();
        let c: Vec<i64> = (0..4usize).map(|m| net.get(m, "c").unwrap()).collect();
        assert_eq!(c, vec![9, 10, 13, 14]);
    }

    #[test]
    fn product_rejects_odd_dimensions() {
        let mut net = Topology::hypercube(4).unwrap();
        assert!(matches!(
            matrix_multiply(&mut net),
            Err(BspError::PreconditionViolation(_))
        ));
    }
}
