//! Client algorithms written against the superstep engine.
//!
//! Network algorithms operate on a [`Topology`] whose units were fed
//! beforehand (variable `a`, plus `b` for matrix products) and leave their
//! result in committed unit state. PRAM algorithms operate on vectors of a
//! [`crate::shared::Pram`].

pub mod butterfly;
pub mod hypercube;
pub mod mesh;
pub mod pram;
pub mod shuffle;

use crate::error::BspError;
use crate::topology::Topology;

fn wrong_topology(net: &Topology, wanted: &str) -> BspError {
    BspError::PreconditionViolation(format!(
        "algorithm needs a {wanted} network, got {}",
        net.kind().label()
    ))
}
