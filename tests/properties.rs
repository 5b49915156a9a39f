//! Property tests for the combinatorial and numerical invariants.

use proptest::prelude::*;

use shgo::{cluster_basins, collect_candidates, deduplicate, Grid, MinimumPoint, Objective, PointCache};

// ─────────────────────────────────────────────────────────────
//  Position formula
// ─────────────────────────────────────────────────────────────

proptest! {
    /// `position(idx)` agrees with any anchored decomposition
    /// `(idx - a) * step + position(a)` to within a few ulp.
    #[test]
    fn position_decomposition_agrees(
        lower in -100.0f64..100.0,
        width in 1e-3f64..1e3,
        divisions in 1usize..=50,
        idx_raw in 0usize..=50,
        anchor_raw in 0usize..=50,
    ) {
        let upper = lower + width;
        let grid = Grid::new(vec![lower], vec![upper], vec![divisions]).unwrap();
        let idx = idx_raw.min(divisions);
        let anchor = anchor_raw.min(divisions);

        let direct = grid.position(&[idx])[0];
        let origin = grid.position(&[anchor])[0];
        let step = grid.spacing(0);
        let decomposed = (idx as f64 - anchor as f64) * step + origin;

        // The roundoff of either route is a few ulp of the operand scale
        // (bound magnitudes and box width), not of the final coordinate.
        let scale = lower.abs() + width + direct.abs();
        prop_assert!(
            (direct - decomposed).abs() <= 8.0 * f64::EPSILON * scale,
            "direct {direct} vs decomposed {decomposed}"
        );
    }

    /// The lower endpoint is exact, and the upper endpoint is reproduced to
    /// within the rounding of `k * width / k`.
    #[test]
    fn position_hits_endpoints(
        lower in -100.0f64..100.0,
        width in 1e-3f64..1e3,
        divisions in 1usize..=50,
    ) {
        let upper = lower + width;
        let grid = Grid::new(vec![lower], vec![upper], vec![divisions]).unwrap();
        prop_assert_eq!(grid.position(&[0])[0], lower);
        let top = grid.position(&[divisions])[0];
        prop_assert!(
            (top - upper).abs() <= 4.0 * f64::EPSILON * (lower.abs() + width),
            "top {top} vs upper {upper}"
        );
    }
}

// ─────────────────────────────────────────────────────────────
//  Clustering order invariance
// ─────────────────────────────────────────────────────────────

/// A wavy 1-d landscape with several separated wells.
struct Washboard;

impl Objective for Washboard {
    fn value(&self, x: &[f64]) -> f64 {
        let t = x[0];
        (6.0 * std::f64::consts::PI * t).sin() + 0.1 * t
    }
    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let t = x[0];
        vec![6.0 * std::f64::consts::PI * (6.0 * std::f64::consts::PI * t).cos() + 0.1]
    }
    fn lower_bounds(&self) -> Vec<f64> {
        vec![0.0]
    }
    fn upper_bounds(&self) -> Vec<f64> {
        vec![1.0]
    }
}

/// Basin partitions as order-independent sets of vertex index tuples.
fn partition_sets(
    basins: &[shgo::Basin],
    candidates: &[Vec<usize>],
) -> Vec<Vec<Vec<usize>>> {
    let mut sets: Vec<Vec<Vec<usize>>> = basins
        .iter()
        .map(|basin| {
            let mut members: Vec<Vec<usize>> = basin
                .members
                .iter()
                .map(|&m| candidates[m].clone())
                .collect();
            members.sort();
            members
        })
        .collect();
    sets.sort();
    sets
}

proptest! {
    #[test]
    fn clustering_is_order_invariant(shuffle_seed in any::<u64>()) {
        let objective = Washboard;
        let grid = Grid::new(vec![0.0], vec![1.0], vec![30]).unwrap();
        let cache = PointCache::new(grid, &objective);
        let candidates = collect_candidates(&cache, 1e-10, None, false);
        prop_assume!(candidates.len() >= 2);

        // Deterministic Fisher-Yates driven by the proptest seed.
        let mut shuffled = candidates.clone();
        let mut state = shuffle_seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }

        let ordered = cluster_basins(&cache, &candidates, 0.1);
        let permuted = cluster_basins(&cache, &shuffled, 0.1);
        prop_assert_eq!(
            partition_sets(&ordered, &candidates),
            partition_sets(&permuted, &shuffled)
        );
    }
}

// ─────────────────────────────────────────────────────────────
//  Deduplication
// ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn deduplication_is_idempotent(
        raw in proptest::collection::vec((-5.0f64..5.0, -5.0f64..5.0, -1.0f64..1.0), 0..40),
    ) {
        let points: Vec<MinimumPoint> = raw
            .into_iter()
            .map(|(x, y, f)| MinimumPoint { minimizer: vec![x, y], objective: f })
            .collect();
        let once = deduplicate(points, 0.05);
        let twice = deduplicate(once.clone(), 0.05);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn deduplication_output_is_sorted(
        raw in proptest::collection::vec((-5.0f64..5.0, -5.0f64..5.0, -1.0f64..1.0), 0..40),
    ) {
        let points: Vec<MinimumPoint> = raw
            .into_iter()
            .map(|(x, y, f)| MinimumPoint { minimizer: vec![x, y], objective: f })
            .collect();
        let unique = deduplicate(points, 0.05);
        for pair in unique.windows(2) {
            prop_assert!(pair[0].objective <= pair[1].objective);
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Star candidates
// ─────────────────────────────────────────────────────────────

proptest! {
    /// Every reported candidate really has no tolerated-smaller neighbour.
    #[test]
    fn candidates_have_no_better_neighbour(divisions in 4usize..=24) {
        let objective = Washboard;
        let grid = Grid::new(vec![0.0], vec![1.0], vec![divisions]).unwrap();
        let cache = PointCache::new(grid, &objective);
        let candidates = collect_candidates(&cache, 1e-10, None, false);
        prop_assert!(!candidates.is_empty());

        for candidate in &candidates {
            let value = cache.value_at(candidate);
            let tolerance = shgo::MIN_EPS.max(value.abs() * 1e-10);
            for delta in [-1i64, 1] {
                let neighbour = [candidate[0] as i64 + delta];
                prop_assert!(cache.value(&neighbour) >= value - tolerance);
            }
        }
    }
}
