//! Star-minimum detection: grid vertices that are no worse than any of
//! their 3^N − 1 axis-and-diagonal neighbours.
//!
//! Out-of-box neighbours read as `+∞` through the cache, so vertices on the
//! boundary are admissible candidates whenever their interior neighbours
//! dominate them.

use std::collections::HashSet;

use crate::cache::PointCache;
use crate::grid::Grid;
use crate::types::MIN_EPS;

/// All nonzero deltas in `{-1, 0, +1}^dim`, in lexicographic order.
pub fn neighbour_deltas(dim: usize) -> Vec<Vec<i64>> {
    let mut deltas = Vec::with_capacity(3usize.pow(dim as u32).saturating_sub(1));
    let mut digits = vec![0usize; dim];
    let limits = vec![2usize; dim];
    loop {
        if digits.iter().any(|&d| d != 1) {
            deltas.push(digits.iter().map(|&d| d as i64 - 1).collect());
        }
        if !Grid::step_index(&mut digits, &limits) {
            break;
        }
    }
    deltas
}

/// Whether a vertex is a star-minimum candidate.
///
/// A neighbour falsifies candidacy iff its value is below the vertex value
/// by more than `max(MIN_EPS, |value| * rel_tol)`. A non-finite vertex
/// value disqualifies outright.
pub fn is_star_minimum(
    cache: &PointCache<'_>,
    idx: &[usize],
    rel_tol: f64,
    deltas: &[Vec<i64>],
) -> bool {
    let value = cache.value_at(idx);
    if !value.is_finite() {
        return false;
    }
    let tolerance = MIN_EPS.max(value.abs() * rel_tol);
    let mut neighbour = vec![0i64; idx.len()];
    for delta in deltas {
        for (slot, (&j, &d)) in neighbour.iter_mut().zip(idx.iter().zip(delta)) {
            *slot = j as i64 + d;
        }
        if cache.value(&neighbour) < value - tolerance {
            return false;
        }
    }
    true
}

/// All star-minimum candidates of the grid, in lexicographic index order.
///
/// When `admissible` is given (gradient-hull pruning), candidacy is
/// restricted to vertices in that set. With `parallel`, the cache is warmed
/// on rayon workers first; the scan itself stays sequential so the
/// candidate order is deterministic either way.
pub fn collect_candidates(
    cache: &PointCache<'_>,
    rel_tol: f64,
    admissible: Option<&HashSet<u64>>,
    parallel: bool,
) -> Vec<Vec<usize>> {
    if parallel {
        cache.warm(true);
    }
    let grid = cache.grid();
    let deltas = neighbour_deltas(grid.dim());
    let limits: Vec<usize> = grid.divisions().to_vec();
    let mut idx = vec![0usize; grid.dim()];
    let mut candidates = Vec::new();
    loop {
        let admitted = admissible.map_or(true, |set| set.contains(&grid.linear(&idx)));
        if admitted && is_star_minimum(cache, &idx, rel_tol, &deltas) {
            candidates.push(idx.clone());
        }
        if !Grid::step_index(&mut idx, &limits) {
            break;
        }
    }
    candidates
}
