//! PPT invariant checks with contract tracking.
//!
//! Engine code asserts invariants by numeric ID. With the `ppt` feature on,
//! every ID that was checked is recorded, and tests call [`contract_test`]
//! to prove the paths they drove really checked what they rely on.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::BTreeSet;
#[cfg(feature = "ppt")]
use std::sync::{Mutex, MutexGuard};

/// Every link of a compiled topology is present on both endpoints.
pub const ADJACENCY_SYMMETRIC: u32 = 1;
/// Every unit of a compiled topology received a neighbor list.
pub const ADJACENCY_COMPLETE: u32 = 2;
/// A committed superstep left no staged entries at its depth.
pub const STEP_ATOMIC_COMMIT: u32 = 3;
/// An aborted superstep left no staged entries at its depth.
pub const STEP_ABORT_CLEAN: u32 = 4;
/// The scheduler depth after a superstep equals the depth before it.
pub const STEP_DEPTH_RESTORED: u32 = 5;
/// An inner superstep committed without touching the outer step's frame.
pub const NESTED_STEP_ISOLATION: u32 = 6;
/// A heap vector holds 2n slots for n leaves, n a power of two.
pub const HEAP_SHAPE_VALID: u32 = 7;
/// A catalog request passed its size checks before a machine was built.
pub const REQUEST_VALIDATED: u32 = 8;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref CHECKED: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());
}

/// The record of checked IDs. Poisoning only means some other test panicked
/// inside an assert, the set itself is still valid.
#[cfg(feature = "ppt")]
fn checked() -> MutexGuard<'static, BTreeSet<u32>> {
    CHECKED.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn failure(id: u32, message: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!("invariant {id} violated: {message} ({ctx})"),
        None => format!("invariant {id} violated: {message}"),
    }
}

/// Check invariant `id`; panics with `message` when `condition` is false.
pub fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let text = failure(id, message, context);
        tracing::error!(invariant = id, "{}", text);
        panic!("{}", text);
    }
    #[cfg(feature = "ppt")]
    checked().insert(id);
}

/// Panic unless every ID in `required` has been checked in this process.
#[cfg(feature = "ppt")]
pub fn contract_test(test_name: &str, required: &[u32]) {
    let missing: Vec<u32> = {
        let seen = checked();
        required.iter().copied().filter(|id| !seen.contains(id)).collect()
    };
    assert!(
        missing.is_empty(),
        "contract '{test_name}' broken: invariants never checked: {missing:?}"
    );
}

/// Without the `ppt` feature nothing is recorded, so contracts always hold.
#[cfg(not(feature = "ppt"))]
pub fn contract_test(_test_name: &str, _required: &[u32]) {}

/// Forget every recorded check, so a test can prove its own path checks.
#[cfg(feature = "ppt")]
pub fn clear_invariant_log() {
    checked().clear();
}

/// Nothing is recorded without the `ppt` feature.
#[cfg(not(feature = "ppt"))]
pub fn clear_invariant_log() {}
