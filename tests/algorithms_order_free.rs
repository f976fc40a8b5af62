use std::fs;
use std::path::Path;

/// Algorithms must not read a neighbor's staged writes: that would make the
/// result depend on the order indices are processed in.
#[test]
fn algorithms_do_not_read_fresh_neighbor_state() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("algorithms");
    for entry in fs::read_dir(&dir).expect("failed to list src/algorithms") {
        let path = entry.expect("failed to read dir entry").path();
        let src = fs::read_to_string(&path).expect("failed to read algorithm source");
        assert!(
            !src.contains("get_fresh_from("),
            "{} reads fresh neighbor state; use `get_from` so supersteps stay order independent",
            path.display()
        );
    }
}
