//! Run-level configuration: deterministic random feeding of machines.

use crate::error::{BspError, Result};
use crate::Value;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How to fill units (or vectors) with random test data.
///
/// The generator is seeded, so the same configuration always produces the
/// same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Smallest value drawn (inclusive).
    pub low: Value,
    /// Largest value drawn (inclusive).
    pub high: Value,
    /// Seed for the ChaCha generator.
    pub seed: u64,
    /// Variables to fill on every unit.
    pub vars: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            low: 0,
            high: 9,
            seed: 0,
            vars: vec!["a".to_string()],
        }
    }
}

impl FeedConfig {
    /// A feed of `vars` drawn from `low..=high` with the given seed.
    pub fn new(low: Value, high: Value, seed: u64, vars: &[&str]) -> Self {
        Self {
            low,
            high,
            seed,
            vars: vars.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn check_range(&self) -> Result<()> {
        if self.low > self.high {
            return Err(BspError::PreconditionViolation(format!(
                "feed range {}..={} is empty",
                self.low, self.high
            )));
        }
        Ok(())
    }

    /// `count` values drawn independently from the range.
    pub fn values(&self, count: usize) -> Result<Vec<Value>> {
        self.check_range()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok((0..count)
            .map(|_| rng.gen_range(self.low..=self.high))
            .collect())
    }

    /// `count` pairwise distinct values drawn from the range.
    pub fn distinct(&self, count: usize) -> Result<Vec<Value>> {
        self.check_range()?;
        let span = self.high.abs_diff(self.low).saturating_add(1);
        if (count as u64) > span {
            return Err(BspError::PreconditionViolation(format!(
                "cannot draw {count} distinct values from {}..={}",
                self.low, self.high
            )));
        }
        let length = usize::try_from(span).unwrap_or(usize::MAX);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(index::sample(&mut rng, length, count)
            .into_iter()
            .map(|offset| self.low + offset as Value)
            .collect())
    }
}
