use bspsim::algorithms::pram;
use bspsim::{FeedConfig, Pram, Value};
use proptest::prelude::*;

fn leaves() -> impl Strategy<Value = Vec<Value>> {
    (0u32..8).prop_flat_map(|log| prop::collection::vec(-1000i64..1000, 1usize << log))
}

fn reduce(values: &[Value], op: fn(Value, Value) -> Value) -> Value {
    let mut machine = Pram::new();
    let heap = machine.heap_from_leaves("a", values).unwrap();
    pram::associative_reduce(&mut machine, heap, values.len(), op).unwrap()
}

proptest! {
    #[test]
    fn reduction_matches_sequential_sum(values in leaves()) {
        let mut machine = Pram::new();
        let heap = machine.heap_from_leaves("a", &values).unwrap();
        let total = pram::sum(&mut machine, heap, values.len()).unwrap();
        prop_assert_eq!(total, values.iter().sum::<Value>());
        prop_assert_eq!(machine.read(heap, 1).unwrap(), total);
    }

    #[test]
    fn reduction_ignores_input_order(values in leaves()) {
        let mut reversed = values.clone();
        reversed.reverse();
        prop_assert_eq!(reduce(&values, |x, y| x + y), reduce(&reversed, |x, y| x + y));
        prop_assert_eq!(reduce(&values, Value::max), values.iter().copied().max().unwrap());
        prop_assert_eq!(reduce(&values, Value::min), values.iter().copied().min().unwrap());
    }

    #[test]
    fn prefix_sums_are_running_sums(values in leaves()) {
        let n = values.len();
        let mut machine = Pram::new();
        let a = machine.heap_from_leaves("a", &values).unwrap();
        let b = machine.alloc("b", 2 * n);
        pram::prefix_sum(&mut machine, a, b, n).unwrap();
        let running: Vec<Value> = values
            .iter()
            .scan(0, |acc, v| {
                *acc += v;
                Some(*acc)
            })
            .collect();
        prop_assert_eq!(machine.slice(b, n..2 * n).unwrap(), running);
    }
}

#[test]
fn prefix_sum_of_one_to_four() {
    let mut machine = Pram::new();
    let a = machine.heap_from_leaves("a", &[1, 2, 3, 4]).unwrap();
    let b = machine.alloc("b", 8);
    pram::prefix_sum(&mut machine, a, b, 4).unwrap();
    assert_eq!(machine.slice(b, 4..8).unwrap(), vec![1, 3, 6, 10]);
}

#[test]
fn optimal_sum_on_power_of_power_sizes() {
    for n in [4usize, 16, 256] {
        let values = FeedConfig::new(1, 2, n as u64, &[]).values(n).unwrap();
        let mut machine = Pram::new();
        let heap = machine.heap_from_leaves("a", &values).unwrap();
        assert_eq!(
            pram::sum_optimal(&mut machine, heap, n).unwrap(),
            values.iter().sum::<Value>()
        );
    }
}

#[test]
fn tournament_sorts_random_distinct_input() {
    for seed in 0..4 {
        let values = FeedConfig::new(0, 10_000, seed, &[]).distinct(16).unwrap();
        let mut expected = values.clone();
        expected.sort_unstable();

        let mut slots = vec![0];
        slots.extend_from_slice(&values);
        let mut machine = Pram::new();
        let crew = machine.alloc_values("crew", &slots);
        let erew = machine.alloc_values("erew", &slots);
        pram::tournament_sort_crew(&mut machine, crew, 16).unwrap();
        pram::tournament_sort_erew(&mut machine, erew, 16).unwrap();
        assert_eq!(machine.slice(crew, 1..17).unwrap(), expected);
        assert_eq!(machine.slice(erew, 1..17).unwrap(), expected);
    }
}

#[test]
fn replicate_thirty_two_copies() {
    let mut machine = Pram::new();
    let cpy = machine.alloc("cpy", 33);
    pram::replicate(&mut machine, cpy, 5, 32).unwrap();
    assert_eq!(machine.slice(cpy, 1..33).unwrap(), vec![5; 32]);
    // One doubling step per bit of n.
    assert_eq!(machine.scheduler().steps_committed(), 5);
}
