//! Local polishing of basin representatives via the `argmin` crate.
//!
//! One representative per basin is handed to an external local optimizer
//! chain: L-BFGS with More-Thuente line search, then steepest descent, then
//! derivative-free Nelder–Mead, and finally the raw starting point. A
//! failure at any stage falls through to the next; polishing is never
//! fatal to the analysis.
//!
//! Uses `Vec<f64>` as the argmin parameter type to avoid ndarray version
//! conflicts between our ndarray 0.16 and argmin-math's bundled ndarray.

use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::gradientdescent::SteepestDescent;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use rayon::prelude::*;
use tracing::warn;

use crate::cache::PointCache;
use crate::cluster::Basin;
use crate::types::{CancelToken, LandscapeOptions, MinimumPoint, Objective, ShgoError};

// ─────────────────────────────────────────────────────────────
//  argmin problem wrapper
// ─────────────────────────────────────────────────────────────

/// Wraps the landscape objective for argmin's `CostFunction` + `Gradient`
/// traits.
///
/// None of the argmin solvers used here is bound-aware, so every iterate is
/// projected onto the box before evaluation. The solver may report a
/// parameter outside the box; [`clamp`](BoxedLandscape::clamp) maps it back
/// to the point whose value was actually measured.
#[derive(Clone)]
struct BoxedLandscape<'a> {
    objective: &'a dyn Objective,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoxedLandscape<'_> {
    fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
            .collect()
    }
}

impl CostFunction for BoxedLandscape<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        if x.iter().any(|v| !v.is_finite()) {
            return Err(argmin::core::Error::msg("parameter contains NaN or Inf"));
        }
        let value = self.objective.value(&self.clamp(x));
        if !value.is_finite() {
            return Err(argmin::core::Error::msg("objective produced NaN or Inf"));
        }
        Ok(value)
    }
}

impl Gradient for BoxedLandscape<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        if x.iter().any(|v| !v.is_finite()) {
            return Err(argmin::core::Error::msg("parameter contains NaN or Inf"));
        }
        let gradient = self.objective.gradient(&self.clamp(x));
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(argmin::core::Error::msg("gradient produced NaN or Inf"));
        }
        Ok(gradient)
    }
}

// ─────────────────────────────────────────────────────────────
//  Solver chain stages
// ─────────────────────────────────────────────────────────────

fn run_lbfgs(
    problem: BoxedLandscape<'_>,
    start: Vec<f64>,
    max_iters: u64,
) -> Result<(Vec<f64>, f64), ShgoError> {
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, 10)
        .with_tolerance_grad(1e-10)
        .map_err(|e| ShgoError::LocalSolver(format!("tolerance_grad: {e}")))?
        .with_tolerance_cost(f64::EPSILON)
        .map_err(|e| ShgoError::LocalSolver(format!("tolerance_cost: {e}")))?;

    let executor = Executor::new(problem, solver).configure(|config| {
        config
            .param(start)
            .max_iters(max_iters)
            .target_cost(f64::NEG_INFINITY)
    });
    extract_best(executor.run().map_err(|e| ShgoError::LocalSolver(e.to_string()))?)
}

fn run_steepest_descent(
    problem: BoxedLandscape<'_>,
    start: Vec<f64>,
    max_iters: u64,
) -> Result<(Vec<f64>, f64), ShgoError> {
    let solver = SteepestDescent::new(MoreThuenteLineSearch::new());
    let executor = Executor::new(problem, solver).configure(|config| {
        config
            .param(start)
            .max_iters(max_iters)
            .target_cost(f64::NEG_INFINITY)
    });
    extract_best(executor.run().map_err(|e| ShgoError::LocalSolver(e.to_string()))?)
}

fn run_nelder_mead(
    problem: BoxedLandscape<'_>,
    start: Vec<f64>,
    max_iters: u64,
) -> Result<(Vec<f64>, f64), ShgoError> {
    // Initial simplex: the start plus one point nudged 5% of the axis
    // range along each axis, flipped inward where the box would be left.
    let mut simplex = vec![start.clone()];
    for axis in 0..start.len() {
        let mut vertex = start.clone();
        let step = 0.05 * (problem.upper[axis] - problem.lower[axis]);
        vertex[axis] = if vertex[axis] + step <= problem.upper[axis] {
            vertex[axis] + step
        } else {
            vertex[axis] - step
        };
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(1e-12)
        .map_err(|e| ShgoError::LocalSolver(format!("sd_tolerance: {e}")))?;
    let executor =
        Executor::new(problem, solver).configure(|config| config.max_iters(max_iters));
    extract_best(executor.run().map_err(|e| ShgoError::LocalSolver(e.to_string()))?)
}

fn extract_best<S, I>(
    result: argmin::core::OptimizationResult<BoxedLandscape<'_>, S, I>,
) -> Result<(Vec<f64>, f64), ShgoError>
where
    I: State<Param = Vec<f64>, Float = f64>,
{
    let best = result
        .state()
        .get_best_param()
        .ok_or_else(|| ShgoError::LocalSolver("solver returned no best parameters".into()))?
        .clone();
    let cost = result.state().get_best_cost();
    Ok((best, cost))
}

// ─────────────────────────────────────────────────────────────
//  Polishing entry points
// ─────────────────────────────────────────────────────────────

/// Polish one starting point with the full fallback chain.
///
/// The returned minimizer always lies inside the box and is never worse
/// than the starting point. Errors only when every stage failed *and* the
/// objective is non-finite at the start.
pub fn polish(
    objective: &dyn Objective,
    start: &[f64],
    max_iters: u64,
) -> Result<MinimumPoint, ShgoError> {
    let problem = BoxedLandscape {
        objective,
        lower: objective.lower_bounds(),
        upper: objective.upper_bounds(),
    };
    let start_value = objective.value(start);

    type Stage = for<'a> fn(
        BoxedLandscape<'a>,
        Vec<f64>,
        u64,
    ) -> Result<(Vec<f64>, f64), ShgoError>;
    let stages: [(&str, Stage); 3] = [
        ("l-bfgs", run_lbfgs),
        ("steepest-descent", run_steepest_descent),
        ("nelder-mead", run_nelder_mead),
    ];

    let mut solved: Option<(Vec<f64>, f64)> = None;
    for (stage, run) in stages {
        match run(problem.clone(), start.to_vec(), max_iters) {
            Ok((x, value)) if value.is_finite() => {
                solved = Some((problem.clamp(&x), value));
                break;
            }
            Ok((_, value)) => {
                warn!(stage, value, "local solver returned a non-finite optimum; falling back");
            }
            Err(e) => {
                warn!(stage, error = %e, "local solve failed; falling back");
            }
        }
    }

    match solved {
        Some((x, value)) if !start_value.is_finite() || value <= start_value => {
            Ok(MinimumPoint { minimizer: x, objective: value })
        }
        // Either the chain found nothing or it made things worse: keep the
        // starting point when it is usable.
        _ if start_value.is_finite() => Ok(MinimumPoint {
            minimizer: start.to_vec(),
            objective: start_value,
        }),
        _ => Err(ShgoError::ObjectiveFailure { position: start.to_vec() }),
    }
}

/// Pull a grid position `eps` inside the box, per axis, so the local
/// solver never starts exactly on the boundary.
fn pull_inside(position: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    position
        .iter()
        .zip(lower.iter().zip(upper))
        .map(|(&v, (&lo, &hi))| {
            let eps = 1e-10f64.max((hi - lo) * 1e-6);
            let (inner_lo, inner_hi) = (lo + eps, hi - eps);
            if inner_lo > inner_hi {
                0.5 * (lo + hi)
            } else {
                v.clamp(inner_lo, inner_hi)
            }
        })
        .collect()
}

fn polish_or_fallback(
    objective: &dyn Objective,
    start: &[f64],
    max_iters: u64,
    cancel: Option<&CancelToken>,
) -> Option<MinimumPoint> {
    if cancel.is_some_and(|token| token.is_cancelled()) {
        // Cancelled before this basin: report the unpolished start.
        let value = objective.value(start);
        return value.is_finite().then(|| MinimumPoint {
            minimizer: start.to_vec(),
            objective: value,
        });
    }
    match polish(objective, start, max_iters) {
        Ok(point) => Some(point),
        Err(e) => {
            warn!(error = %e, "basin polish failed; basin contributes no minimum");
            None
        }
    }
}

/// Polish the representative of every basin.
///
/// Basins are independent; a failure in one never blocks the others. With
/// `options.parallel` the basins run on rayon workers.
pub fn polish_basins(
    cache: &PointCache<'_>,
    candidates: &[Vec<usize>],
    basins: &[Basin],
    objective: &dyn Objective,
    options: &LandscapeOptions,
) -> Vec<MinimumPoint> {
    let grid = cache.grid();
    let starts: Vec<Vec<f64>> = basins
        .iter()
        .map(|basin| {
            let position = grid.position(&candidates[basin.representative]);
            pull_inside(&position, grid.lower(), grid.upper())
        })
        .collect();

    let cancel = options.cancel.as_ref();
    if options.parallel {
        starts
            .par_iter()
            .filter_map(|start| {
                polish_or_fallback(objective, start, options.local_maxiters, cancel)
            })
            .collect()
    } else {
        starts
            .iter()
            .filter_map(|start| {
                polish_or_fallback(objective, start, options.local_maxiters, cancel)
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────
//  Deduplication
// ─────────────────────────────────────────────────────────────

fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn lexicographic(a: &[f64], b: &[f64]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.total_cmp(y);
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Deduplicate polished minima.
///
/// Sorted ascending by objective (ties broken by minimizer coordinates so
/// the output is deterministic), then greedily accepted. A point is merged
/// into an already-accepted one only when it is both closer than
/// `dist_tol` *and* its value agrees within `max(1e-6, |f| * 1e-4)`;
/// two geometrically close minima with distinct values are kept apart.
/// Idempotent.
pub fn deduplicate(mut points: Vec<MinimumPoint>, dist_tol: f64) -> Vec<MinimumPoint> {
    points.sort_by(|a, b| {
        a.objective
            .total_cmp(&b.objective)
            .then_with(|| lexicographic(&a.minimizer, &b.minimizer))
    });

    let mut accepted: Vec<MinimumPoint> = Vec::new();
    'next_point: for point in points {
        for kept in &accepted {
            let close = l2_distance(&point.minimizer, &kept.minimizer) < dist_tol;
            let value_close = (point.objective - kept.objective).abs()
                < 1e-6f64.max(kept.objective.abs() * 1e-4);
            if close && value_close {
                continue 'next_point;
            }
        }
        accepted.push(point);
    }
    accepted
}
