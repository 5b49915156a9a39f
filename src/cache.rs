//! Memoized, concurrency-safe objective evaluation over grid vertices.
//!
//! The cache is the only shared-mutable structure in one refinement
//! iteration. It is sharded: each shard is a `Mutex<HashMap>` and the shard
//! lock is held across the user objective call, so a miss blocks concurrent
//! misses in the *same* shard only; misses in other shards proceed. This is
//! the documented contention trade-off of the sharded design.
//!
//! Out-of-range lookups return `+∞` (infinity padding), which lets boundary
//! vertices participate in star-minimum detection without special cases.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use tracing::warn;

use crate::grid::Grid;
use crate::types::{Objective, MIN_EPS};

const SHARDS: usize = 64;

#[derive(Debug, Clone)]
struct VertexRecord {
    value: f64,
    /// Filled on first gradient demand so value-only phases never pay
    /// gradient calls.
    gradient: Option<Vec<f64>>,
}

/// Memoized `(value, gradient)` records for one grid resolution.
///
/// Guarantees at-most-one objective evaluation per vertex under concurrent
/// access. Non-finite results are returned to the caller but never retained,
/// so the next access retries.
pub struct PointCache<'a> {
    grid: Grid,
    objective: &'a dyn Objective,
    shards: Vec<Mutex<HashMap<u64, VertexRecord>>>,
    value_calls: AtomicUsize,
    gradient_calls: AtomicUsize,
}

impl<'a> PointCache<'a> {
    /// Wrap a grid and an objective into an empty cache.
    pub fn new(grid: Grid, objective: &'a dyn Objective) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            grid,
            objective,
            shards,
            value_calls: AtomicUsize::new(0),
            gradient_calls: AtomicUsize::new(0),
        }
    }

    /// The grid this cache evaluates on.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Number of objective value calls performed so far (misses only).
    pub fn evaluations(&self) -> usize {
        self.value_calls.load(Ordering::Relaxed)
    }

    /// Number of gradient calls performed so far.
    pub fn gradient_evaluations(&self) -> usize {
        self.gradient_calls.load(Ordering::Relaxed)
    }

    fn shard(&self, lin: u64) -> &Mutex<HashMap<u64, VertexRecord>> {
        &self.shards[(lin as usize) % SHARDS]
    }

    /// Value at a signed index tuple; `+∞` outside the vertex range.
    pub fn value(&self, idx: &[i64]) -> f64 {
        if !self.grid.contains(idx) {
            return f64::INFINITY;
        }
        let unsigned: Vec<usize> = idx.iter().map(|&j| j as usize).collect();
        self.value_at(&unsigned)
    }

    /// Value at a valid vertex index, evaluating on first demand.
    pub fn value_at(&self, idx: &[usize]) -> f64 {
        let lin = self.grid.linear(idx);
        let mut map = self
            .shard(lin)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = map.get(&lin) {
            return record.value;
        }
        let position = self.grid.position(idx);
        self.value_calls.fetch_add(1, Ordering::Relaxed);
        let value = self.objective.value(&position);
        if value.is_finite() {
            map.insert(lin, VertexRecord { value, gradient: None });
        } else {
            warn!(?position, value, "objective returned a non-finite value; entry not cached");
        }
        value
    }

    /// Value and gradient at a valid vertex index.
    ///
    /// Reuses a cached value and upgrades the record with the gradient on
    /// first demand.
    pub fn vertex(&self, idx: &[usize]) -> (f64, Vec<f64>) {
        let lin = self.grid.linear(idx);
        let position = self.grid.position(idx);
        let mut map = self
            .shard(lin)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(record) = map.get_mut(&lin) {
            if let Some(gradient) = &record.gradient {
                return (record.value, gradient.clone());
            }
            self.gradient_calls.fetch_add(1, Ordering::Relaxed);
            let gradient = self.objective.gradient(&position);
            if gradient.iter().all(|c| c.is_finite()) {
                record.gradient = Some(gradient.clone());
            } else {
                warn!(?position, "objective returned a non-finite gradient; not cached");
            }
            return (record.value, gradient);
        }

        self.value_calls.fetch_add(1, Ordering::Relaxed);
        let value = self.objective.value(&position);
        self.gradient_calls.fetch_add(1, Ordering::Relaxed);
        let gradient = self.objective.gradient(&position);
        if value.is_finite() && gradient.iter().all(|c| c.is_finite()) {
            map.insert(
                lin,
                VertexRecord { value, gradient: Some(gradient.clone()) },
            );
        } else {
            warn!(?position, value, "non-finite vertex record; entry not cached");
        }
        (value, gradient)
    }

    /// Populate every vertex value, optionally on rayon workers.
    ///
    /// The population order is unspecified; results are identical either
    /// way because evaluation is idempotent per index.
    pub fn warm(&self, parallel: bool) {
        let n = self.grid.vertex_count();
        if parallel {
            (0..n).into_par_iter().for_each(|lin| {
                self.value_at(&self.grid.vertex_at(lin));
            });
        } else {
            for lin in 0..n {
                self.value_at(&self.grid.vertex_at(lin));
            }
        }
    }

    /// Spread of the finite cached values, floored at [`MIN_EPS`].
    ///
    /// Used as the reference scale for the basin-merge tolerance.
    pub fn finite_value_range(&self) -> f64 {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for shard in &self.shards {
            let map = shard.lock().unwrap_or_else(PoisonError::into_inner);
            for record in map.values() {
                if record.value.is_finite() {
                    lo = lo.min(record.value);
                    hi = hi.max(record.value);
                }
            }
        }
        if lo > hi {
            MIN_EPS
        } else {
            (hi - lo).max(MIN_EPS)
        }
    }
}
