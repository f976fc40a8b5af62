//! Butterfly algorithms.

use super::wrong_topology;
use crate::error::{add_at, Result};
use crate::index::IndexSet;
use crate::plan::TopologyKind;
use crate::topology::Topology;

/// Sum variable `a` over every unit into unit (0,0).
///
/// Columns are accumulated down to the last level, the column sums are then
/// combined upwards along the cross links, and with `propagate` the total
/// is copied back down every column.
pub fn sum(net: &mut Topology, propagate: bool) -> Result<()> {
    let k = match net.kind() {
        TopologyKind::Butterfly { k } => k as usize,
        _ => return Err(wrong_topology(net, "BUTTERFLY")),
    };
    let cols = 1usize << k;

    for level in 1..=k {
        net.forall(IndexSet::grid(level..level + 1, 0..cols), |p| {
            let above = p.get_from("a", (level - 1, p.col()?))?;
            let own = p.get("a")?;
            p.set("a", add_at(p.coord(), own, above)?);
            Ok(())
        })?;
    }
    for level in (0..k).rev() {
        let cross = 1usize << (k - 1 - level);
        net.forall(IndexSet::grid(level..level + 1, 0..cols), |p| {
            let col = p.col()?;
            let straight = p.get_from("a", (level + 1, col))?;
            let diagonal = p.get_from("a", (level + 1, col ^ cross))?;
            p.set("a", add_at(p.coord(), straight, diagonal)?);
            Ok(())
        })?;
    }
    if propagate {
        for level in 1..=k {
            net.forall(IndexSet::grid(level..level + 1, 0..cols), |p| {
                let above = p.get_from("a", (level - 1, p.col()?))?;
                p.set("a", above);
                Ok(())
            })?;
        }
    }
    Ok(())
}
