//! Shuffle-exchange algorithms.

use super::wrong_topology;
use crate::error::{add_at, Result};
use crate::plan::TopologyKind;
use crate::topology::Topology;

/// Sum variable `a` so that every unit ends up holding the total.
///
/// Each of the p rounds is a shuffle step, in which unit j takes `a` from
/// the unit whose shuffle image it is, followed by an exchange step that
/// adds the exchange partner's value. Variable `b` is used as scratch.
pub fn sum(net: &mut Topology) -> Result<()> {
    let p = match net.kind() {
        TopologyKind::ShuffleExchange { p } => p,
        _ => return Err(wrong_topology(net, "SHUFFLE-EXCHANGE")),
    };
    let n = 1usize << p;

    for _ in 0..p {
        net.forall(0..n, |u| {
            let j = u.coord().i;
            let source = if j % 2 == 0 { j / 2 } else { (n + j - 1) / 2 };
            let a = u.get_from("a", source)?;
            u.set("a", a);
            u.set("b", a);
            Ok(())
        })?;
        net.forall(0..n, |u| {
            let partner = u.get_from("b", u.coord().i ^ 1)?;
            let own = u.get("a")?;
            u.set("a", add_at(u.coord(), own, partner)?);
            Ok(())
        })?;
    }
    Ok(())
}
