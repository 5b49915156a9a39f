//! Gradient-hull pruning of Kuhn simplices.
//!
//! A simplex can contain an interior critical point only if the zero vector
//! lies in the convex hull of the gradients at its vertices (first-order
//! necessary condition via the mean-value argument). For N+1 gradients in
//! R^N the membership test reduces to the barycentric system
//! `[G; 1ᵀ] λ = [0; 1]`: the origin is inside the hull iff the system has a
//! solution with all coefficients non-negative.
//!
//! Pruning is a performance filter only. Anything that cannot be decided
//! safely (non-finite gradients, affinely degenerate gradient sets)
//! retains the simplex.

use std::collections::HashSet;

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::cache::PointCache;
use crate::kuhn::{Permutations, Simplex, SimplexStream};

/// Slack on barycentric coefficients, the numerical inflation of the hull.
pub const HULL_COEFF_TOLERANCE: f64 = 1e-9;

/// Whether the origin lies in the convex hull of `dim + 1` gradient vectors.
///
/// Returns `true` (retain) for non-finite input or a degenerate hull.
pub fn origin_in_gradient_hull(gradients: &[Vec<f64>]) -> bool {
    let m = gradients.len();
    debug_assert!(m >= 1 && gradients.iter().all(|g| g.len() + 1 == m));

    if gradients.iter().any(|g| g.iter().any(|c| !c.is_finite())) {
        return true;
    }

    let dim = m - 1;
    let mut a = Array2::<f64>::zeros((m, m));
    for (j, g) in gradients.iter().enumerate() {
        for (i, &c) in g.iter().enumerate() {
            a[[i, j]] = c;
        }
        a[[dim, j]] = 1.0;
    }
    let mut b = Array1::<f64>::zeros(m);
    b[dim] = 1.0;

    if solve_in_place(&mut a, &mut b) {
        b.iter().all(|&coeff| coeff >= -HULL_COEFF_TOLERANCE)
    } else {
        true
    }
}

/// Gaussian elimination with partial pivoting; the solution replaces `b`.
/// Returns `false` on a (near-)singular system.
fn solve_in_place(a: &mut Array2<f64>, b: &mut Array1<f64>) -> bool {
    let n = b.len();
    let scale = a.iter().fold(0.0f64, |acc, &v| acc.max(v.abs())).max(1.0);
    let pivot_floor = scale * 1e-13;

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_mag = a[[col, col]].abs();
        for row in col + 1..n {
            let mag = a[[row, col]].abs();
            if mag > pivot_mag {
                pivot_row = row;
                pivot_mag = mag;
            }
        }
        if pivot_mag < pivot_floor {
            return false;
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = a[[col, k]];
                a[[col, k]] = a[[pivot_row, k]];
                a[[pivot_row, k]] = tmp;
            }
            b.swap(col, pivot_row);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[[col, k]] * b[k];
        }
        b[col] = sum / a[[col, col]];
    }
    true
}

/// Whether a simplex survives pruning, fetching gradients through the cache.
pub fn keep_simplex(cache: &PointCache<'_>, simplex: &Simplex) -> bool {
    let gradients: Vec<Vec<f64>> = simplex
        .vertices()
        .iter()
        .map(|idx| cache.vertex(idx).1)
        .collect();
    origin_in_gradient_hull(&gradients)
}

/// Linear indices of every vertex incident to at least one kept simplex.
///
/// Star candidacy is restricted to this set when pruning is enabled.
pub fn admissible_vertices(cache: &PointCache<'_>, parallel: bool) -> HashSet<u64> {
    let grid = cache.grid();

    if !parallel {
        let mut admissible = HashSet::new();
        for simplex in SimplexStream::new(grid) {
            if keep_simplex(cache, &simplex) {
                for idx in simplex.vertices() {
                    admissible.insert(grid.linear(idx));
                }
            }
        }
        return admissible;
    }

    (0..grid.cell_count())
        .into_par_iter()
        .map(|cell_lin| {
            let cell = cell_at(grid.divisions(), cell_lin);
            let mut local = HashSet::new();
            let mut perms = Permutations::new(grid.dim());
            while let Some(path) = perms.next() {
                let simplex = Simplex::from_cell_and_path(&cell, path);
                if keep_simplex(cache, &simplex) {
                    for idx in simplex.vertices() {
                        local.insert(grid.linear(idx));
                    }
                }
            }
            local
        })
        .reduce(HashSet::new, |mut acc, local| {
            acc.extend(local);
            acc
        })
}

/// Cell lower corner for a row-major cell number over `divisions`.
fn cell_at(divisions: &[usize], mut lin: u64) -> Vec<usize> {
    let mut strides = vec![1u64; divisions.len()];
    for i in (0..divisions.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * divisions[i + 1] as u64;
    }
    let mut cell = vec![0usize; divisions.len()];
    for (i, &s) in strides.iter().enumerate() {
        cell[i] = (lin / s) as usize;
        lin %= s;
    }
    cell
}
