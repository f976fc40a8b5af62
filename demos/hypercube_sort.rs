use bspsim::algorithms::hypercube;
use bspsim::{FeedConfig, Topology};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 16 units, one value each
    let mut net = Topology::hypercube(4).unwrap();
    net.random_feed(&FeedConfig::new(-99, 99, 2024, &["a"])).unwrap();
    println!("before:\n{}", net);

    hypercube::bitonic_sort(&mut net).unwrap();
    println!("after:\n{}", net);
    println!("sorted: {:?}", net.variable("a").unwrap());
}
