//! Uniform rectilinear lattice over the search box.
//!
//! Vertex positions are always computed by the direct formula
//! `lb + idx * (ub - lb) / k`, never by cumulative addition, so the
//! floating-point error of any coordinate is O(1) in the grid size.

use crate::types::ShgoError;

/// A uniform grid over an N-dimensional box, with `divisions[i] >= 1` cells
/// per axis and `divisions[i] + 1` vertices per axis.
#[derive(Debug, Clone)]
pub struct Grid {
    lower: Vec<f64>,
    upper: Vec<f64>,
    divisions: Vec<usize>,
    /// Row-major strides over vertex indices, for linear cache keys.
    strides: Vec<u64>,
}

impl Grid {
    /// Build a grid, validating the box and the division counts.
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        divisions: Vec<usize>,
    ) -> Result<Self, ShgoError> {
        if lower.is_empty() {
            return Err(ShgoError::EmptyDomain);
        }
        if lower.len() != upper.len() {
            return Err(ShgoError::MismatchedBounds {
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        for (axis, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(ShgoError::InvalidBounds { axis, lower: lo, upper: hi });
            }
        }
        if divisions.len() != lower.len() || divisions.iter().any(|&k| k < 1) {
            return Err(ShgoError::InvalidOption {
                name: "divisions",
                reason: format!("need one count >= 1 per axis, got {divisions:?}"),
            });
        }

        let mut strides = vec![1u64; divisions.len()];
        for i in (0..divisions.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * (divisions[i + 1] as u64 + 1);
        }

        Ok(Self { lower, upper, divisions, strides })
    }

    /// Dimensionality of the box.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Division count per axis.
    pub fn divisions(&self) -> &[usize] {
        &self.divisions
    }

    /// Lower bounds of the box.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper bounds of the box.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Grid spacing along one axis.
    pub fn spacing(&self, axis: usize) -> f64 {
        (self.upper[axis] - self.lower[axis]) / self.divisions[axis] as f64
    }

    /// Total number of vertices, `prod(k_i + 1)`.
    pub fn vertex_count(&self) -> u64 {
        self.divisions.iter().map(|&k| k as u64 + 1).product()
    }

    /// Total number of cells, `prod(k_i)`.
    pub fn cell_count(&self) -> u64 {
        self.divisions.iter().map(|&k| k as u64).product()
    }

    /// Physical position of a vertex, by the direct formula.
    pub fn position(&self, idx: &[usize]) -> Vec<f64> {
        debug_assert_eq!(idx.len(), self.dim());
        idx.iter()
            .enumerate()
            .map(|(i, &j)| {
                self.lower[i] + j as f64 * (self.upper[i] - self.lower[i]) / self.divisions[i] as f64
            })
            .collect()
    }

    /// Whether a signed index tuple lies inside the vertex range
    /// `0 <= idx[i] <= k[i]`.
    pub fn contains(&self, idx: &[i64]) -> bool {
        idx.len() == self.dim()
            && idx
                .iter()
                .zip(&self.divisions)
                .all(|(&j, &k)| j >= 0 && j <= k as i64)
    }

    /// Linear (row-major) index of a valid vertex, used as the cache key.
    pub fn linear(&self, idx: &[usize]) -> u64 {
        debug_assert!(self.contains(&idx.iter().map(|&j| j as i64).collect::<Vec<_>>()));
        idx.iter().zip(&self.strides).map(|(&j, &s)| j as u64 * s).sum()
    }

    /// Inverse of [`linear`](Self::linear).
    pub fn vertex_at(&self, mut lin: u64) -> Vec<usize> {
        let mut idx = vec![0usize; self.dim()];
        for (i, &s) in self.strides.iter().enumerate() {
            idx[i] = (lin / s) as usize;
            lin %= s;
        }
        idx
    }

    /// Advance a vertex index tuple in lexicographic order.
    ///
    /// `limits[i]` is the inclusive maximum per axis. Returns `false` once
    /// the odometer wraps past the last tuple.
    pub fn step_index(idx: &mut [usize], limits: &[usize]) -> bool {
        for i in (0..idx.len()).rev() {
            if idx[i] < limits[i] {
                idx[i] += 1;
                return true;
            }
            idx[i] = 0;
        }
        false
    }
}
