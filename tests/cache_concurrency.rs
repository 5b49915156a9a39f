//! Point-cache contract under heavy concurrent access.
//!
//! Run with:   cargo test --release --test cache_concurrency -- --nocapture

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shgo::functions::Rosenbrock;
use shgo::{Grid, Objective, PointCache};

const WORKERS: usize = 64;
const LOOKUPS_PER_WORKER: usize = 10_000;

#[test]
fn concurrent_lookups_evaluate_each_vertex_at_most_once() {
    let objective = Rosenbrock::new(vec![-2.0, -2.0], vec![2.0, 2.0]);
    let grid = Grid::new(vec![-2.0, -2.0], vec![2.0, 2.0], vec![100, 100]).unwrap();
    let cache = PointCache::new(grid.clone(), &objective);

    std::thread::scope(|scope| {
        for worker in 0..WORKERS {
            let cache = &cache;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker as u64);
                for _ in 0..LOOKUPS_PER_WORKER {
                    let idx = [rng.gen_range(0..=100usize), rng.gen_range(0..=100usize)];
                    let value = cache.value_at(&idx);
                    assert!(value.is_finite(), "Rosenbrock is finite on the box");
                }
            });
        }
    });

    let evaluations = cache.evaluations();
    eprintln!("evaluations after {} random lookups: {evaluations}", WORKERS * LOOKUPS_PER_WORKER);
    assert!(
        evaluations <= 10_201,
        "at most one evaluation per vertex, got {evaluations}"
    );

    // Returned values must be internally consistent with a direct
    // evaluation at the vertex position.
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    for _ in 0..200 {
        let idx = [rng.gen_range(0..=100usize), rng.gen_range(0..=100usize)];
        let expected = objective.value(&grid.position(&idx));
        assert_eq!(cache.value_at(&idx), expected, "mismatch at {idx:?}");
    }
}

#[test]
fn concurrent_and_serial_caches_agree() {
    let objective = Rosenbrock::new(vec![-2.0, -2.0], vec![2.0, 2.0]);
    let grid = Grid::new(vec![-2.0, -2.0], vec![2.0, 2.0], vec![20, 20]).unwrap();

    let parallel = PointCache::new(grid.clone(), &objective);
    parallel.warm(true);
    let serial = PointCache::new(grid.clone(), &objective);
    serial.warm(false);

    assert_eq!(parallel.evaluations(), serial.evaluations());
    for lin in 0..grid.vertex_count() {
        let idx = grid.vertex_at(lin);
        assert_eq!(parallel.value_at(&idx), serial.value_at(&idx));
    }
}
