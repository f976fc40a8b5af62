//! Error types shared by every layer of the simulator.

use crate::shared::VecId;
use crate::unit::Coord;
use crate::Value;
use thiserror::Error;

/// Errors raised while building machines or running supersteps.
///
/// None of these are retried: supersteps are deterministic, so re-running a
/// failed step with the same inputs reproduces the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BspError {
    /// A unit read a variable that was never written on the target unit.
    #[error("unit {unit} read variable '{name}' that has not been set yet")]
    UnsetVariable {
        /// The unit (or PRAM slot) that was read.
        unit: Coord,
        /// The variable or vector name.
        name: String,
    },
    /// A unit tried to read from a unit it is not linked to.
    #[error("unit {from} has no link to unit {to}")]
    NoSuchNeighbor {
        /// The reading unit.
        from: Coord,
        /// The requested source.
        to: Coord,
    },
    /// A coordinate resolves to no unit or slot.
    #[error("coordinate {coord} is out of range")]
    IndexOutOfRange {
        /// The offending coordinate.
        coord: Coord,
    },
    /// A caller-supplied size or shape does not satisfy the algorithm.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    /// An arithmetic result does not fit in a [`Value`].
    #[error("arithmetic overflow at unit {unit}")]
    Overflow {
        /// The unit (or PRAM process) that computed the value.
        unit: Coord,
    },
    /// A shared vector handle that was never allocated or was freed.
    #[error("shared vector {0:?} does not exist")]
    UnknownVector(VecId),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BspError>;

/// Returns true when `n` is a non-zero power of two.
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Fails with [`BspError::PreconditionViolation`] unless `n` is a power of two.
pub fn require_power_of_two(what: &str, n: usize) -> Result<u32> {
    if is_power_of_two(n) {
        Ok(n.trailing_zeros())
    } else {
        Err(BspError::PreconditionViolation(format!(
            "{what} must be a power of 2, got {n}"
        )))
    }
}

/// `x + y` computed by `unit`, failing with [`BspError::Overflow`] instead of wrapping.
pub fn add_at(unit: Coord, x: Value, y: Value) -> Result<Value> {
    x.checked_add(y).ok_or(BspError::Overflow { unit })
}

/// `x - y` computed by `unit`.
pub fn sub_at(unit: Coord, x: Value, y: Value) -> Result<Value> {
    x.checked_sub(y).ok_or(BspError::Overflow { unit })
}

/// `x * y` computed by `unit`.
pub fn mul_at(unit: Coord, x: Value, y: Value) -> Result<Value> {
    x.checked_mul(y).ok_or(BspError::Overflow { unit })
}
