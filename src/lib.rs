//! Deterministic bulk-synchronous parallel simulator.
//!
//! Units of a fixed network ([`Topology`]) or processes of a shared-memory
//! machine ([`Pram`]) run in supersteps: every write made during a step is
//! staged and becomes visible only at the step's barrier.

pub mod algorithms;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod plan;
pub mod scheduler;
pub mod shared;
pub mod topology;
pub mod unit;

/// Scalar held by unit variables and shared vector slots.
pub type Value = i64;

pub use catalog::{execute, Output, Request, Response};
pub use config::FeedConfig;
pub use error::{BspError, Result};
pub use index::IndexSet;
pub use plan::{AdjacencyPlan, TopologyKind};
pub use scheduler::{superstep, Machine, Scheduler, StepReport};
pub use shared::{Pram, VecId};
pub use topology::{Proc, Topology};
pub use unit::{Coord, Unit, UnitId};
