use bspsim::algorithms::pram;
use bspsim::Pram;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let leaves = [5, 6, 3, 13, -2, 8, 0, 1];
    let n = leaves.len();
    let mut machine = Pram::new();
    let a = machine.heap_from_leaves("a", &leaves).unwrap();
    let b = machine.alloc("b", 2 * n);

    pram::prefix_sum(&mut machine, a, b, n).unwrap();

    println!("input:    {:?}", leaves);
    println!("prefix:   {:?}", machine.slice(b, n..2 * n).unwrap());
    println!("subtrees: {:?}", machine.values(a).unwrap());
    println!("supersteps: {}", machine.scheduler().steps_committed());
}
