use bspsim::algorithms::mesh;
use bspsim::Topology;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut net = Topology::grid(4, false).unwrap();
    let values: Vec<i64> = (1..=16).collect();
    net.feed("a", &values).unwrap();

    mesh::sum(&mut net, false).unwrap();
    println!("total at (0,0): {}", net.get((0, 0), "a").unwrap());

    // Partial sums overwrote `a`; start again and broadcast this time.
    net.feed("a", &values).unwrap();
    mesh::sum(&mut net, true).unwrap();
    println!("{}", net);
}
