//! Basin clustering: a value-tolerant union-find over star-minimum
//! candidates.
//!
//! Two candidates join the same basin iff they are 3^N-neighbours *and*
//! their values differ by less than `value_range * threshold_ratio`.
//! Neighbour lookups go through a linear-index map, so the work is
//! O(K * 3^N * α(K)) in the candidate count K, never the pairwise O(K²)
//! graph. The resulting partition, the representatives, and the basin order
//! are all independent of the enumeration order.

use std::collections::HashMap;

use crate::cache::PointCache;
use crate::star::neighbour_deltas;

/// Index-based disjoint-set forest with union by rank and path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Root of the set containing `x`, compressing the path walked.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `a` and `b`; `false` if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// One basin: an equivalence class of candidate positions.
#[derive(Debug, Clone)]
pub struct Basin {
    /// Positions into the candidate slice, ascending.
    pub members: Vec<usize>,
    /// The member with the lowest cached value (ties broken by linear
    /// vertex index), used as the polishing start.
    pub representative: usize,
}

/// Partition star-minimum candidates into basins.
pub fn cluster_basins(
    cache: &PointCache<'_>,
    candidates: &[Vec<usize>],
    threshold_ratio: f64,
) -> Vec<Basin> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let grid = cache.grid();
    let merge_tolerance = cache.finite_value_range() * threshold_ratio;
    let deltas = neighbour_deltas(grid.dim());

    let linear_ids: Vec<u64> = candidates.iter().map(|c| grid.linear(c)).collect();
    let values: Vec<f64> = candidates.iter().map(|c| cache.value_at(c)).collect();
    let by_linear: HashMap<u64, usize> = linear_ids
        .iter()
        .enumerate()
        .map(|(i, &lin)| (lin, i))
        .collect();

    let mut sets = DisjointSet::new(candidates.len());
    let mut neighbour = vec![0i64; grid.dim()];
    for (i, candidate) in candidates.iter().enumerate() {
        for delta in &deltas {
            for (slot, (&j, &d)) in neighbour.iter_mut().zip(candidate.iter().zip(delta)) {
                *slot = j as i64 + d;
            }
            if !grid.contains(&neighbour) {
                continue;
            }
            let unsigned: Vec<usize> = neighbour.iter().map(|&j| j as usize).collect();
            if let Some(&j) = by_linear.get(&grid.linear(&unsigned)) {
                if j > i && (values[i] - values[j]).abs() < merge_tolerance {
                    sets.union(i, j);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..candidates.len() {
        let root = sets.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut basins: Vec<Basin> = groups
        .into_values()
        .map(|mut members| {
            members.sort_unstable();
            let representative = members
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    values[a]
                        .total_cmp(&values[b])
                        .then(linear_ids[a].cmp(&linear_ids[b]))
                })
                .unwrap_or(members[0]);
            Basin { members, representative }
        })
        .collect();
    basins.sort_by_key(|basin| linear_ids[basin.members[0]]);
    basins
}
