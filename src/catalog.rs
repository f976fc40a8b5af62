//! Catalog of canned algorithms behind a request/response surface.
//!
//! A [`Request`] names one algorithm and carries its input. [`execute`]
//! checks the input's shape before any machine is built, runs the algorithm
//! and returns the input next to the committed result.

use crate::algorithms::{butterfly, hypercube, mesh, pram, shuffle};
use crate::config::FeedConfig;
use crate::error::{is_power_of_two, require_power_of_two, BspError, Result};
use crate::invariant_ppt::{assert_invariant, REQUEST_VALIDATED};
use crate::plan::TopologyKind;
use crate::shared::Pram;
use crate::topology::Topology;
use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Bounds for randomly generated sort inputs.
const RANDOM_LOW: Value = -10_000;
const RANDOM_HIGH: Value = 10_000;

/// Largest machine a request may build, in units or processes.
pub const MAX_UNITS: usize = 1 << 18;

/// Input of a tournament sort: explicit values or `{"random": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortInput {
    /// Values to sort.
    Values(Vec<Value>),
    /// n distinct values drawn from a seeded generator.
    Random {
        /// How many values to draw.
        random: usize,
        /// Generator seed.
        #[serde(default)]
        seed: u64,
    },
}

/// One algorithm invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Request {
    /// Heap reduction with n processes.
    PramSum {
        /// Leaves, power-of-two length.
        a: Vec<Value>,
    },
    /// Heap reduction with n / log n processes.
    PramSumOptimal {
        /// Leaves; length and its log must be powers of two.
        a: Vec<Value>,
    },
    /// Inclusive prefix sums.
    PramPrefixSum {
        /// Leaves, power-of-two length.
        a: Vec<Value>,
    },
    /// Replicate one value.
    PramReplicate {
        /// Value to copy.
        datum: Value,
        /// Number of copies, a power of two.
        ncopies: usize,
    },
    /// Tournament sort with concurrent reads.
    TournamentCrew {
        /// Distinct values, power-of-two count.
        a: SortInput,
    },
    /// Tournament sort with exclusive reads.
    TournamentErew {
        /// Distinct values, power-of-two count.
        a: SortInput,
    },
    /// Sum on a hypercube of `a.len()` units.
    HypercubeSum {
        /// One value per unit.
        a: Vec<Value>,
        /// Broadcast the total back to every unit.
        #[serde(default)]
        propagate: bool,
    },
    /// Bitonic merge sort on a hypercube.
    HypercubeBitonic {
        /// One value per unit.
        a: Vec<Value>,
    },
    /// Matrix product on a hypercube of n^3 units.
    HypercubeMatrix {
        /// Left operand, n x n with n a power of two.
        a: Vec<Vec<Value>>,
        /// Right operand, same shape.
        b: Vec<Vec<Value>>,
    },
    /// Sum on a butterfly.
    ButterflySum {
        /// Number of stages.
        k: u32,
        /// (k+1) * 2^k values, level by level.
        a: Vec<Value>,
        /// Copy the total back to every unit.
        #[serde(default)]
        propagate: bool,
    },
    /// Sum on a grid.
    MeshSum {
        /// p^2 values, row-major.
        a: Vec<Value>,
        /// Copy the total back to every unit.
        #[serde(default)]
        propagate: bool,
    },
    /// Matrix product on a wraparound grid.
    MeshMatrix {
        /// Left operand, square.
        a: Vec<Vec<Value>>,
        /// Right operand, same shape.
        b: Vec<Vec<Value>>,
    },
    /// Sum on a shuffle-exchange network.
    ShuffleSum {
        /// One value per unit.
        a: Vec<Value>,
    },
}

impl Request {
    /// Snake-case algorithm name, as used in the `algorithm` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Request::PramSum { .. } => "pram_sum",
            Request::PramSumOptimal { .. } => "pram_sum_optimal",
            Request::PramPrefixSum { .. } => "pram_prefix_sum",
            Request::PramReplicate { .. } => "pram_replicate",
            Request::TournamentCrew { .. } => "tournament_crew",
            Request::TournamentErew { .. } => "tournament_erew",
            Request::HypercubeSum { .. } => "hypercube_sum",
            Request::HypercubeBitonic { .. } => "hypercube_bitonic",
            Request::HypercubeMatrix { .. } => "hypercube_matrix",
            Request::ButterflySum { .. } => "butterfly_sum",
            Request::MeshSum { .. } => "mesh_sum",
            Request::MeshMatrix { .. } => "mesh_matrix",
            Request::ShuffleSum { .. } => "shuffle_sum",
        }
    }
}

/// A value, vector or matrix exchanged with the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    /// A single value.
    Scalar(Value),
    /// A vector of values.
    Vector(Vec<Value>),
    /// Rows of values.
    Matrix(Vec<Vec<Value>>),
}

/// Result of a request: what was run on, and what came out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// The effective input (random inputs are materialized).
    pub input: Vec<Output>,
    /// Committed result.
    pub result: Output,
}

fn reject(message: impl Into<String>) -> BspError {
    BspError::PreconditionViolation(message.into())
}

fn vector_len(a: &[Value]) -> Result<u32> {
    require_power_of_two("the length of vector \"a\"", a.len())
}

fn square(name: &str, m: &[Vec<Value>]) -> Result<usize> {
    let n = m.len();
    if n == 0 || m.iter().any(|row| row.len() != n) {
        return Err(reject(format!("matrix \"{name}\" must be square and non-empty")));
    }
    Ok(n)
}

fn same_square(a: &[Vec<Value>], b: &[Vec<Value>]) -> Result<usize> {
    let n = square("a", a)?;
    if square("b", b)? != n {
        return Err(reject("the size of the matrices must be equal"));
    }
    Ok(n)
}

fn exact_sqrt(n: usize) -> Option<usize> {
    let guess = (n as f64).sqrt() as usize;
    (guess.saturating_sub(1)..=guess + 1).find(|p| p.checked_mul(*p) == Some(n))
}

fn rows(values: Vec<Value>, width: usize) -> Vec<Vec<Value>> {
    values.chunks(width.max(1)).map(<[Value]>::to_vec).collect()
}

fn sort_values(input: &SortInput) -> Result<Vec<Value>> {
    let values = match input {
        SortInput::Values(values) => values.clone(),
        SortInput::Random { random, seed } => {
            FeedConfig::new(RANDOM_LOW, RANDOM_HIGH, *seed, &[]).distinct(*random)?
        }
    };
    require_power_of_two("the number of values to sort", values.len())?;
    within_limit(values.len().saturating_mul(values.len()))?;
    if values.iter().collect::<BTreeSet<_>>().len() != values.len() {
        return Err(reject("input vector must contain distinct elements"));
    }
    Ok(values)
}

fn within_limit(units: usize) -> Result<()> {
    if units > MAX_UNITS {
        return Err(reject(format!(
            "request needs {units} units, the limit is {MAX_UNITS}"
        )));
    }
    Ok(())
}

/// Build `kind` and check it holds exactly `units` units.
fn build(kind: TopologyKind, units: usize) -> Result<Topology> {
    within_limit(units)?;
    let net = Topology::build(kind)?;
    assert_invariant(
        REQUEST_VALIDATED,
        net.len() == units,
        "machine sized from a validated request",
        Some(kind.label()),
    );
    Ok(net)
}

/// Validate and run `request`.
pub fn execute(request: &Request) -> Result<Response> {
    debug!(algorithm = request.name(), "executing request");
    let response = run(request)?;
    info!(algorithm = request.name(), "request completed");
    Ok(response)
}

fn run(request: &Request) -> Result<Response> {
    match request {
        Request::PramSum { a } | Request::PramSumOptimal { a } => {
            vector_len(a)?;
            let n = a.len();
            within_limit(n.saturating_mul(2))?;
            if matches!(request, Request::PramSumOptimal { .. })
                && (n < 4 || !is_power_of_two(n.trailing_zeros() as usize))
            {
                return Err(reject("\"n\" and log(\"n\") must be both power of 2, with n >= 4"));
            }
            let mut machine = Pram::new();
            let heap = machine.heap_from_leaves("a", a)?;
            let total = match request {
                Request::PramSumOptimal { .. } => pram::sum_optimal(&mut machine, heap, n)?,
                _ => pram::sum(&mut machine, heap, n)?,
            };
            Ok(Response {
                input: vec![Output::Vector(a.clone())],
                result: Output::Scalar(total),
            })
        }
        Request::PramPrefixSum { a } => {
            vector_len(a)?;
            let n = a.len();
            within_limit(n.saturating_mul(2))?;
            let mut machine = Pram::new();
            let heap = machine.heap_from_leaves("a", a)?;
            let prefix = machine.alloc("b", 2 * n);
            pram::prefix_sum(&mut machine, heap, prefix, n)?;
            Ok(Response {
                input: vec![Output::Vector(a.clone())],
                result: Output::Vector(machine.slice(prefix, n..2 * n)?),
            })
        }
        Request::PramReplicate { datum, ncopies } => {
            require_power_of_two("\"ncopies\"", *ncopies)?;
            within_limit(*ncopies)?;
            let mut machine = Pram::new();
            let cpy = machine.alloc("cpy", ncopies + 1);
            pram::replicate(&mut machine, cpy, *datum, *ncopies)?;
            Ok(Response {
                input: vec![Output::Scalar(*datum)],
                result: Output::Vector(machine.slice(cpy, 1..ncopies + 1)?),
            })
        }
        Request::TournamentCrew { a } | Request::TournamentErew { a } => {
            let values = sort_values(a)?;
            let n = values.len();
            let mut slots = Vec::with_capacity(n + 1);
            slots.push(0);
            slots.extend_from_slice(&values);
            let mut machine = Pram::new();
            let v = machine.alloc_values("a", &slots);
            match request {
                Request::TournamentErew { .. } => pram::tournament_sort_erew(&mut machine, v, n)?,
                _ => pram::tournament_sort_crew(&mut machine, v, n)?,
            }
            Ok(Response {
                input: vec![Output::Vector(values)],
                result: Output::Vector(machine.slice(v, 1..n + 1)?),
            })
        }
        Request::HypercubeSum { a, propagate } => {
            let k = vector_len(a)?;
            let mut net = build(TopologyKind::Hypercube { k }, a.len())?;
            net.feed("a", a)?;
            hypercube::sum(&mut net, *propagate)?;
            Ok(Response {
                input: vec![Output::Vector(a.clone())],
                result: Output::Vector(net.variable("a")?),
            })
        }
        Request::HypercubeBitonic { a } => {
            let k = vector_len(a)?;
            let mut net = build(TopologyKind::Hypercube { k }, a.len())?;
            net.feed("a", a)?;
            hypercube::bitonic_sort(&mut net)?;
            Ok(Response {
                input: vec![Output::Vector(a.clone())],
                result: Output::Vector(net.variable("a")?),
            })
        }
        Request::HypercubeMatrix { a, b } => {
            let n = same_square(a, b)?;
            let h = require_power_of_two("the size of the matrices", n)?;
            let k = 3 * h;
            let units = 1usize
                .checked_shl(k)
                .ok_or_else(|| reject(format!("a hypercube of dimension {k} is too large")))?;
            within_limit(units)?;
            let mut net = build(TopologyKind::Hypercube { k }, units)?;
            for (m, (x, y)) in a.iter().flatten().zip(b.iter().flatten()).enumerate() {
                net.set(m, "a", *x)?;
                net.set(m, "b", *y)?;
            }
            hypercube::matrix_multiply(&mut net)?;
            let product = (0..n * n)
                .map(|m| net.get(m, "c"))
                .collect::<Result<Vec<Value>>>()?;
            Ok(Response {
                input: vec![Output::Matrix(a.clone()), Output::Matrix(b.clone())],
                result: Output::Matrix(rows(product, n)),
            })
        }
        Request::ButterflySum { k, a, propagate } => {
            let cols = 1usize
                .checked_shl(*k)
                .filter(|cols| cols.checked_mul(*k as usize + 1) == Some(a.len()))
                .ok_or_else(|| {
                    reject("the length of vector \"a\" must be equal to (k+1)*(2**k)")
                })?;
            let mut net = build(TopologyKind::Butterfly { k: *k }, a.len())?;
            net.feed("a", a)?;
            butterfly::sum(&mut net, *propagate)?;
            Ok(Response {
                input: vec![Output::Matrix(rows(a.clone(), cols))],
                result: Output::Matrix(rows(net.variable("a")?, cols)),
            })
        }
        Request::MeshSum { a, propagate } => {
            let p = exact_sqrt(a.len()).filter(|p| *p > 0).ok_or_else(|| {
                reject("the length of vector \"a\" must be p**2 for a positive integer p")
            })?;
            let mut net = build(
                TopologyKind::Grid {
                    n: p,
                    wraparound: false,
                },
                a.len(),
            )?;
            net.feed("a", a)?;
            mesh::sum(&mut net, *propagate)?;
            Ok(Response {
                input: vec![Output::Matrix(rows(a.clone(), p))],
                result: Output::Matrix(rows(net.variable("a")?, p)),
            })
        }
        Request::MeshMatrix { a, b } => {
            let n = same_square(a, b)?;
            let mut net = build(
                TopologyKind::Grid {
                    n,
                    wraparound: true,
                },
                n * n,
            )?;
            net.feed("a", &a.concat())?;
            net.feed("b", &b.concat())?;
            mesh::matrix_multiply(&mut net)?;
            Ok(Response {
                input: vec![Output::Matrix(a.clone()), Output::Matrix(b.clone())],
                result: Output::Matrix(rows(net.variable("c")?, n)),
            })
        }
        Request::ShuffleSum { a } => {
            let p = vector_len(a)?;
            let mut net = build(TopologyKind::ShuffleExchange { p }, a.len())?;
            net.feed("a", a)?;
            shuffle::sum(&mut net)?;
            Ok(Response {
                input: vec![Output::Vector(a.clone())],
                result: Output::Vector(net.variable("a")?),
            })
        }
    }
}
