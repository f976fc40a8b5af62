use bspsim::algorithms::{hypercube, mesh, pram};
use bspsim::{FeedConfig, Pram, Topology};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_bitonic_sort(c: &mut Criterion) {
    let values = FeedConfig::new(-1000, 1000, 3, &[]).values(256).unwrap();

    c.bench_function("hypercube_bitonic_256", |b| {
        b.iter(|| {
            let mut net = Topology::hypercube(8).unwrap();
            net.feed("a", black_box(&values)).unwrap();
            hypercube::bitonic_sort(&mut net).unwrap();
            black_box(net.variable("a").unwrap());
        })
    });
}

fn bench_pram_reductions(c: &mut Criterion) {
    let leaves = FeedConfig::new(0, 100, 9, &[]).values(1024).unwrap();

    c.bench_function("pram_sum_1024", |b| {
        b.iter(|| {
            let mut machine = Pram::new();
            let a = machine.heap_from_leaves("a", black_box(&leaves)).unwrap();
            black_box(pram::sum(&mut machine, a, 1024).unwrap());
        })
    });

    c.bench_function("pram_prefix_1024", |b| {
        b.iter(|| {
            let mut machine = Pram::new();
            let a = machine.heap_from_leaves("a", black_box(&leaves)).unwrap();
            let out = machine.alloc("b", 2048);
            pram::prefix_sum(&mut machine, a, out, 1024).unwrap();
            black_box(machine.values(out).unwrap());
        })
    });
}

fn bench_mesh_sum(c: &mut Criterion) {
    // Sequential row pass dominates for wide grids.
    let values = FeedConfig::new(0, 9, 1, &[]).values(32 * 32).unwrap();

    c.bench_function("mesh_sum_32x32", |b| {
        b.iter(|| {
            let mut net = Topology::grid(32, false).unwrap();
            net.feed("a", black_box(&values)).unwrap();
            mesh::sum(&mut net, true).unwrap();
            black_box(net.get((0, 0), "a").unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_bitonic_sort,
    bench_pram_reductions,
    bench_mesh_sum
);
criterion_main!(benches);
